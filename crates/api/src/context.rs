use flashsale_core::UserId;

/// Authenticated user context for a request.
///
/// This is immutable and must be present for all seckill routes; requests
/// without a resolvable session never reach a handler.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct UserContext {
    user_id: UserId,
}

impl UserContext {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }
}
