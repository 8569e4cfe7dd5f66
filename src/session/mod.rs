mod clock;
mod gateway;
pub mod protocol;
mod registry;
mod relay;

pub use clock::MeetingClock;
pub use gateway::{SessionGateway, SessionHandler};
pub use registry::RoomRegistry;
