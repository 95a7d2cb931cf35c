//! services/juris/src/ai/prompts.rs
//!
//! Prompt templates for every drafting task. Each builder is deterministic:
//! the same input always yields the same prompt.

use juris_core::domain::{DefenseRequest, Party, PetitionRequest};

pub const SYSTEM_INSTRUCTION: &str = r#"Você é um advogado brasileiro sênior, com ampla experiência em contencioso cível, trabalhista, previdenciário, consumerista e de família.

Seu estilo:
- Linguagem jurídica formal, clara e objetiva, conforme a norma culta da língua portuguesa.
- Fundamentação sempre baseada na legislação brasileira vigente (Constituição Federal, Código Civil, CPC/2015, CLT, CDC e leis especiais pertinentes) e na jurisprudência dos tribunais superiores.
- Nunca invente números de processos, ementas ou dispositivos legais. Se não tiver certeza de uma citação, descreva o entendimento sem citar número.
- Estruture as peças conforme os requisitos do art. 319 do CPC quando aplicável.

Formato de saída:
- Quando for pedido um documento, responda APENAS com HTML simples (h1, h2, h3, p, ul, ol, li, strong, em), sem blocos de código markdown, sem <html>, <head> ou <body>.
- Quando for pedido JSON, responda APENAS com o JSON solicitado, sem comentários."#;

const EXTRACTION_TEMPLATE: &str = r#"Analise os documentos anexados (petições, contratos, procurações, documentos pessoais, comprovantes) e extraia os dados do caso.

Responda com um objeto JSON com exatamente estas chaves:
{
  "plaintiffName": "nome completo do autor/cliente",
  "plaintiffDocument": "CPF ou CNPJ do autor",
  "plaintiffAddress": "endereço completo do autor",
  "defendantName": "nome completo do réu/parte contrária",
  "defendantDocument": "CPF ou CNPJ do réu",
  "defendantAddress": "endereço completo do réu",
  "factsSummary": "resumo objetivo dos fatos relevantes",
  "relevantDates": ["datas relevantes no formato DD/MM/AAAA"],
  "claimedValue": "valor envolvido, se houver, ou null"
}

Use string vazia para qualquer informação não encontrada. Não invente dados."#;

const PETITION_TEMPLATE: &str = r#"Redija uma PETIÇÃO INICIAL completa.

ÁREA DO DIREITO: {area}
TIPO DE AÇÃO: {action_type}

AUTOR:
{plaintiff}

RÉU:
{defendant}

FATOS:
{facts}

PEDIDOS:
{requests}

PROVAS A PRODUZIR:
{evidence}

TUTELA DE URGÊNCIA: {urgency}
VALOR DA CAUSA: {claim_value}
DOCUMENTOS ANALISADOS: {documents}

A peça deve conter: endereçamento ao juízo competente, qualificação completa das partes, dos fatos, do direito (com fundamentação legal e jurisprudencial), {urgency_section}dos pedidos, valor da causa, requerimento de provas e fecho com local, data e espaço para assinatura do advogado (OAB)."#;

const DEFENSE_TEMPLATE: &str = r#"Redija uma peça de DEFESA do tipo {defense_type}.

ÁREA DO DIREITO: {area}

CLIENTE (parte que se defende):
{client}

PARTE CONTRÁRIA:
{opposing}

RESUMO DA PETIÇÃO INICIAL / ACUSAÇÃO:
{claim_summary}

VERSÃO DO CLIENTE E FATOS DA DEFESA:
{defense_facts}

TESES DEFENSIVAS A DESENVOLVER:
{theses}

DOCUMENTOS ANALISADOS: {documents}

A peça deve conter: endereçamento, qualificação, síntese da inicial, preliminares cabíveis (se houver), mérito com impugnação específica dos fatos (art. 341 do CPC), fundamentação legal e jurisprudencial, pedidos, requerimento de provas e fecho com espaço para assinatura do advogado (OAB)."#;

const FILING_METADATA_TEMPLATE: &str = r#"Com base na peça abaixo, sugira os dados de cadastro para o peticionamento eletrônico (PJe/e-SAJ).

Responda com um objeto JSON com exatamente estas chaves:
{
  "competence": "foro/vara/juízo competente sugerido",
  "proceduralClass": "classe processual conforme a tabela do CNJ",
  "mainSubject": "assunto principal conforme a tabela do CNJ",
  "claimValue": "valor da causa ou null",
  "freeJusticeRequested": true ou false
}

PEÇA:
{content}"#;

const JURISPRUDENCE_TEMPLATE: &str = r#"Pesquise e apresente jurisprudência relevante dos tribunais brasileiros (STF, STJ, TST, TRFs e TJs) sobre o tema abaixo.

TEMA: {query}
ÁREA: {area}

Para cada entendimento encontrado, apresente em HTML: tribunal, tipo de recurso, resumo do entendimento e como ele pode ser aplicado ao caso. Agrupe os entendimentos em favoráveis e desfavoráveis. Se não tiver certeza do número de um julgado, não o invente: descreva apenas o entendimento consolidado."#;

const REFINE_TEMPLATE: &str = r#"Revise a peça jurídica abaixo aplicando as instruções do advogado. Mantenha toda a estrutura e o conteúdo que não for afetado pelas instruções. Devolva a peça completa revisada.

INSTRUÇÕES:
{instructions}

PEÇA ATUAL:
{content}"#;

pub const TRANSCRIPTION_PROMPT: &str = "Transcreva fielmente o áudio anexado em português do Brasil. Responda apenas com o texto transcrito, sem comentários, com pontuação adequada.";

fn or_not_informed(value: &str) -> &str {
    if value.trim().is_empty() {
        "Não informado"
    } else {
        value.trim()
    }
}

fn bullet_list(items: &[String]) -> String {
    let items: Vec<String> = items
        .iter()
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(|item| format!("- {}", item))
        .collect();
    if items.is_empty() {
        "Não informado".to_string()
    } else {
        items.join("\n")
    }
}

fn describe_party(party: &Party) -> String {
    format!(
        "Nome: {}\nCPF/CNPJ: {}\nEndereço: {}\nQualificação: {}",
        or_not_informed(&party.name),
        or_not_informed(&party.document),
        or_not_informed(&party.address),
        or_not_informed(&party.qualification),
    )
}

fn document_list(names: &[String]) -> String {
    if names.is_empty() {
        "Nenhum".to_string()
    } else {
        names.join(", ")
    }
}

pub fn extraction_prompt() -> String {
    EXTRACTION_TEMPLATE.to_string()
}

pub fn petition_prompt(request: &PetitionRequest) -> String {
    let (urgency, urgency_section) = if request.urgent_relief {
        ("Sim, requerer tutela de urgência (art. 300 do CPC)", "da tutela de urgência, ")
    } else {
        ("Não", "")
    };
    PETITION_TEMPLATE
        .replace("{area}", or_not_informed(&request.area))
        .replace("{action_type}", or_not_informed(&request.action_type))
        .replace("{plaintiff}", &describe_party(&request.plaintiff))
        .replace("{defendant}", &describe_party(&request.defendant))
        .replace("{facts}", or_not_informed(&request.facts))
        .replace("{requests}", &bullet_list(&request.requests))
        .replace("{evidence}", &bullet_list(&request.evidence))
        .replace("{urgency_section}", urgency_section)
        .replace("{urgency}", urgency)
        .replace(
            "{claim_value}",
            or_not_informed(request.claim_value.as_deref().unwrap_or_default()),
        )
        .replace("{documents}", &document_list(&request.analyzed_documents))
}

pub fn defense_prompt(request: &DefenseRequest) -> String {
    DEFENSE_TEMPLATE
        .replace("{defense_type}", or_not_informed(&request.defense_type))
        .replace("{area}", or_not_informed(&request.area))
        .replace("{client}", &describe_party(&request.client))
        .replace("{opposing}", &describe_party(&request.opposing_party))
        .replace("{claim_summary}", or_not_informed(&request.initial_claim_summary))
        .replace("{defense_facts}", or_not_informed(&request.defense_facts))
        .replace("{theses}", &bullet_list(&request.theses))
        .replace("{documents}", &document_list(&request.analyzed_documents))
}

pub fn filing_metadata_prompt(content: &str) -> String {
    FILING_METADATA_TEMPLATE.replace("{content}", content)
}

pub fn jurisprudence_prompt(query: &str, area: Option<&str>) -> String {
    JURISPRUDENCE_TEMPLATE
        .replace("{query}", query.trim())
        .replace("{area}", or_not_informed(area.unwrap_or_default()))
}

pub fn refine_prompt(content: &str, instructions: &str) -> String {
    REFINE_TEMPLATE
        .replace("{instructions}", instructions.trim())
        .replace("{content}", content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn petition_prompt_fills_every_placeholder() {
        let request = PetitionRequest {
            area: "Consumidor".to_string(),
            action_type: "Indenização por danos morais".to_string(),
            plaintiff: Party {
                name: "Ana Souza".to_string(),
                ..Party::default()
            },
            requests: vec!["Condenação em R$ 10.000,00".to_string(), " ".to_string()],
            urgent_relief: true,
            ..PetitionRequest::default()
        };

        let prompt = petition_prompt(&request);

        assert!(!prompt.contains('{'));
        assert!(prompt.contains("Nome: Ana Souza"));
        assert!(prompt.contains("- Condenação em R$ 10.000,00"));
        assert!(prompt.contains("art. 300 do CPC"));
        assert!(prompt.contains("da tutela de urgência, dos pedidos"));
        assert!(prompt.contains("FATOS:\nNão informado"));
    }

    #[test]
    fn prompts_are_deterministic() {
        let request = DefenseRequest {
            defense_type: "Contestação".to_string(),
            theses: vec!["Prescrição".to_string()],
            ..DefenseRequest::default()
        };
        assert_eq!(defense_prompt(&request), defense_prompt(&request));
        assert!(defense_prompt(&request).contains("- Prescrição"));
    }
}
