// Interface adapters: wire protocol and network handling.

pub mod clients;
pub mod dispatch;
pub mod framing;
pub mod handlers;
pub mod host;
pub mod net;
