use crate::commands::Out;
use rmcp::model::{CallToolResult, Content};
use rmcp::ErrorData;
use serde::Serialize;
use std::fmt::Debug;
use tracing::error;

/// The message as text content, followed by the structured data (if any) as JSON content.
pub(super) fn to_content<T>(out: Out<T>) -> Vec<Content>
where
    T: Debug + Clone + Serialize,
{
    let mut content = vec![Content::text(out.message())];
    if let Some(object) = out.structure() {
        match Content::json(object) {
            Ok(json) => content.push(json),
            Err(e) => error!("Unable to serialize JSON output: {e}"),
        };
    }
    content
}

/// A failed command is reported to the agent as an error result with the error's message, not
/// as a protocol error.
pub(super) fn tool_result<T>(result: crate::Result<Out<T>>) -> Result<CallToolResult, ErrorData>
where
    T: Debug + Clone + Serialize,
{
    Ok(match result {
        Ok(out) => CallToolResult::success(to_content(out)),
        Err(e) => {
            error!("Tool call failed ({}): {e}", e.error_type());
            CallToolResult::error(vec![Content::text(e.to_string())])
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{tagged, ErrorType, IntoResult};

    #[test]
    fn test_success_has_text_and_json() {
        let out = Out::new("Total: 1.00", vec![1, 2]);
        let result = tool_result(Ok(out)).unwrap();
        assert!(!result.is_error.unwrap_or(false));
        assert_eq!(result.content.len(), 2);
        assert_eq!(result.content[0].as_text().unwrap().text, "Total: 1.00");
    }

    #[test]
    fn test_error_is_error_result() {
        let r: crate::Result<Out<()>> =
            Err(tagged(ErrorType::NotFound, "no such sheet")).pub_result(ErrorType::Internal);
        let result = tool_result(r).unwrap();
        assert!(result.is_error.unwrap_or(false));
        assert_eq!(result.content[0].as_text().unwrap().text, "no such sheet");
    }
}
