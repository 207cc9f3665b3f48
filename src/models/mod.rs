pub mod symbol;
pub mod request;
pub mod server_query;
pub mod user;

pub use symbol::Symbol;
pub use request::{
    CanonicalRequest, ConditionPayload, ContentKey, Direction, Period, RequestContent, RequestId,
    SubscriberId, UserRequest,
};
pub use server_query::{ServerKey, ServerQuery};
pub use user::User;
