//! Interactive-user session lifecycle (`spec.md` §4.5): cookie shapes,
//! PKCE helpers, and the `UserSessionManager` that ties them to the
//! `Store` and `IdentityProvider`.

pub mod cookies;
pub mod manager;
pub mod pkce;

pub use cookies::{CookieConfig, SameSite, SessionCookie};
pub use manager::{
    CreateSessionInput, CreateSessionRequest, ExchangedAccessToken, RefreshedTokens, SessionTokens,
    UserSessionManager, UserSessionManagerConfig,
};
