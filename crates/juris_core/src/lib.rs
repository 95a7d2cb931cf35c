pub mod domain;
pub mod events;
pub mod ports;

pub use domain::{
    AccountStatus, Attachment, AuthEvent, AuthEventKind, Credentials, Deadline, DeadlinePatch,
    DeadlineStatus, DefenseRequest, ExtractedCaseData, FilingMetadata, NewDeadline, NewPetition,
    NewProfile, NewSavedJurisprudence, Party, Petition, PetitionPatch, PetitionRequest, Profile,
    ProfilePatch, Record, Role, SavedJurisprudence, Session, SessionUser, SignUp, Table,
    UsageLimit, UserUpdate,
};
pub use events::{AuthChannel, AuthListener, Subscription};
pub use ports::{
    AiProvider, AuthService, Filter, GenerateRequest, Ordering, PortError, PortResult, PromptPart,
    Row, SelectSpec, SlotStorage, TableService, from_row, to_row, NOT_FOUND_CODE,
};
