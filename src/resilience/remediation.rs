//! Caller-supplied handlers for captcha and validation challenges.

use crate::errors::VkResult;
use async_trait::async_trait;

/// Resolves human-verification challenges raised by the API.
///
/// The orchestrator awaits these methods while the call is suspended; the
/// call resumes with the returned answer.
#[async_trait]
pub trait RemediationHandler: Send + Sync {
    /// Solve a captcha; the answer is sent back as `captcha_key`
    async fn resolve_captcha(&self, image_url: &str, session_id: &str) -> VkResult<String>;

    /// Complete validation at `redirect_url`; returns the access token to
    /// continue with
    async fn resolve_validation(&self, redirect_url: &str) -> VkResult<String>;

    /// Confirm an action described by `text`; `true` resends with `confirm=1`
    async fn confirm(&self, _text: &str) -> VkResult<bool> {
        Ok(false)
    }
}
