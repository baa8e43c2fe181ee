//! Token building/parsing primitives (`spec.md` §4.1).

mod claims;
mod codec;

pub use claims::{TokenInput, TokenType, VerifiedToken, DEFAULT_AUDIENCE, PRIVATE_CLAIM_PREFIX};
pub use codec::{peek_issuer, TokenCodec};
