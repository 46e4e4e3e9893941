pub mod biginfo;
pub mod codec;
pub mod command;
pub mod constants;
pub mod error;
pub mod logs;
pub mod packet;
pub mod response;
pub mod state;

pub use command::Command;
pub use error::PumpError;
pub use logs::{LogKind, LogRecord};
pub use packet::{MsgType, ResultCode};
pub use response::Response;
pub use state::PumpState;
