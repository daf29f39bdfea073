//! `MATCH` as a function name.
//!
//! A call to `MATCH(cols)` on its own only records the column list; the
//! search text comes from the `AGAINST(...)` that must follow it, which the
//! [`fulltext`](crate::fulltext) module handles.

use super::{Arity, FunctionSpec, Mapping};

pub(super) const FUNCTIONS: &[FunctionSpec] = &[FunctionSpec {
    name: "MATCH",
    aliases: &[],
    arity: Arity::AtLeast(1),
    mapping: Mapping::RequiresPairing,
}];

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::super::{map_function, FunctionArg, FunctionCall, FunctionOutput};
    use crate::error::TranslateError;

    #[test]
    fn test_standalone_match_needs_pairing() {
        let out = map_function(
            "MATCH",
            &[FunctionArg::field("title"), FunctionArg::field("body")],
        )
        .unwrap();
        assert_eq!(
            out,
            FunctionOutput::RequiresPairing {
                columns: vec!["title".into(), "body".into()]
            }
        );
        assert_eq!(
            out.to_json(),
            json!({"type": "MATCH", "requires": "AGAINST", "columns": ["title", "body"]})
        );
    }

    #[test]
    fn test_match_nested_in_expression_fails() {
        let call = FunctionCall::new(
            "LENGTH",
            vec![FunctionArg::Call(FunctionCall::new(
                "MATCH",
                vec![FunctionArg::field("title")],
            ))],
        );
        assert_eq!(
            call.map().unwrap_err(),
            TranslateError::UnpairedMatch { outer: "LENGTH" }
        );
    }
}
