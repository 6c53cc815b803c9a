//! Binary codec for the room data channel. One ordered, reliable
//! logical channel per room carries postcard-encoded frames.

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Fixed name of the per-room data channel.
pub const CHANNEL: &str = "parlor";

pub fn encode<T: Serialize>(value: &T) -> Result<Bytes, postcard::Error> {
    postcard::to_allocvec(value).map(Bytes::from)
}

pub fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T, postcard::Error> {
    postcard::from_bytes(data)
}
