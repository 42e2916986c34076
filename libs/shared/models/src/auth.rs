use std::fmt;

use uuid::Uuid;

/// The signed-in user as seen by the booking client.
///
/// The backend authenticates with an HTTP-only cookie; the client forwards
/// `cookie` verbatim and never looks inside it.
#[derive(Clone)]
pub struct Session {
    pub user_id: Uuid,
    pub email: Option<String>,
    cookie: String,
}

impl Session {
    pub fn new(user_id: Uuid, cookie: impl Into<String>) -> Self {
        Self {
            user_id,
            email: None,
            cookie: cookie.into(),
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn cookie_header(&self) -> &str {
        &self.cookie
    }

    pub fn is_anonymous(&self) -> bool {
        self.cookie.is_empty()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("cookie", &"<redacted>")
            .finish()
    }
}
