// Plain record types. Business rules live in the service layer; the only
// behavior on these structs is pure derived-field computation.

pub mod credential;
pub mod showtime;
pub mod store;
pub mod subject;
pub mod user;

pub use credential::QrCredential;
pub use showtime::Showtime;
pub use store::PartnerStore;
pub use subject::{Subject, SubjectKind, SubjectStatus};
pub use user::User;
