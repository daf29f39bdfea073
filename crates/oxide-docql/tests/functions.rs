//! Tests for scalar function mapping, checked by shape and by evaluating the
//! emitted expressions.

mod common;
use common::*;

use oxide_docql::functions::{self, parse_call, Domain, FunctionArg, FunctionCall, FunctionOutput};
use oxide_docql::{eval, map_function, TranslateError};
use serde_json::json;

// ===================================================================
// Registry lookup
// ===================================================================

#[test]
fn aliases_resolve_to_canonical_names() {
    let cases = [
        ("pow", Domain::Math, "POWER"),
        ("CEILING", Domain::Math, "CEIL"),
        ("ucase", Domain::String, "UPPER"),
        ("Mid", Domain::String, "SUBSTRING"),
        ("SHA", Domain::Encryption, "SHA1"),
        ("match", Domain::Fulltext, "MATCH"),
    ];
    for (name, domain, canonical) in cases {
        let (found, spec) = functions::lookup(name).unwrap_or_else(|| panic!("{name} not found"));
        assert_eq!(found, domain, "{name}");
        assert_eq!(spec.name, canonical, "{name}");
    }
}

#[test]
fn unknown_function_is_rejected() {
    let err = map_function("levenshtein", &[FunctionArg::field("a")]).unwrap_err();
    assert_eq!(
        err,
        TranslateError::UnsupportedFunction {
            name: "LEVENSHTEIN".to_string()
        }
    );
}

// ===================================================================
// Arity
// ===================================================================

#[test]
fn power_requires_two_arguments() {
    for args in [
        vec![FunctionArg::field("x")],
        vec![FunctionArg::field("x"), FunctionArg::lit(2_i64), FunctionArg::lit(3_i64)],
    ] {
        let err = map_function("POWER", &args).unwrap_err();
        assert!(matches!(err, TranslateError::Arity { name: "POWER", .. }));
        assert!(
            err.to_string().contains("POWER requires exactly 2 arguments"),
            "{err}"
        );
    }
    let err = map_function("POW", &[]).unwrap_err();
    assert_eq!(err.to_string(), "POWER requires exactly 2 arguments, got 0");
}

#[test]
fn variadic_functions_need_two_arguments() {
    for name in ["CONCAT", "GREATEST", "LEAST"] {
        let err = map_function(name, &[FunctionArg::field("a")]).unwrap_err();
        assert!(matches!(err, TranslateError::Arity { got: 1, .. }), "{name}");
    }
    let args: Vec<_> = (0..5).map(|i| FunctionArg::field(format!("f{i}"))).collect();
    assert!(map_function("CONCAT", &args).is_ok());
}

// ===================================================================
// Server-side expressions
// ===================================================================

#[test]
fn parsed_calls_map_to_operators() {
    let cases = [
        ("UPPER(name)", json!({"$toUpper": ["$name"]})),
        ("ABS(t.delta)", json!({"$abs": ["$t.delta"]})),
        ("POW(x, 2)", json!({"$pow": ["$x", 2]})),
        ("CONCAT(first, ' ', last)", json!({"$concat": ["$first", " ", "$last"]})),
        ("STRCMP(a, b)", json!({"$strcasecmp": ["$a", "$b"]})),
    ];
    for (text, expected) in cases {
        let output = parse_call(text)
            .unwrap_or_else(|e| panic!("{text}: {e}"))
            .map()
            .unwrap_or_else(|e| panic!("{text}: {e}"));
        assert_eq!(output.to_json(), expected, "{text}");
    }
}

#[test]
fn pi_is_a_constant() {
    let output = map_function("PI", &[]).unwrap();
    assert_eq!(output.to_json(), json!(std::f64::consts::PI));
}

#[test]
fn string_positions_are_one_based() {
    let doc = json!({});
    let haystack = FunctionArg::lit("abcabc");
    assert_eq!(
        evaluate("INSTR", &[haystack.clone(), FunctionArg::lit("b")], &doc),
        json!(2)
    );
    assert_eq!(
        evaluate("INSTR", &[haystack.clone(), FunctionArg::lit("z")], &doc),
        json!(0)
    );
    assert_eq!(
        evaluate("LOCATE", &[FunctionArg::lit("b"), haystack, FunctionArg::lit(3_i64)], &doc),
        json!(5)
    );
    assert_eq!(
        evaluate(
            "SUBSTRING",
            &[FunctionArg::lit("hello"), FunctionArg::lit(2_i64), FunctionArg::lit(3_i64)],
            &doc
        ),
        json!("ell")
    );
}

#[test]
fn substring_and_locate_edge_positions() {
    let doc = json!({"name": "hello", "short": "hi", "at": -3, "zero": 0});
    let name = FunctionArg::field("name");
    let substring = |args: &[FunctionArg]| evaluate("SUBSTRING", args, &doc);
    assert_eq!(substring(&[name.clone(), FunctionArg::lit(-3_i64)]), json!("llo"));
    assert_eq!(
        substring(&[name.clone(), FunctionArg::lit(-3_i64), FunctionArg::lit(2_i64)]),
        json!("ll")
    );
    assert_eq!(substring(&[FunctionArg::field("short"), FunctionArg::lit(-3_i64)]), json!(""));
    assert_eq!(
        substring(&[name.clone(), FunctionArg::lit(0_i64), FunctionArg::lit(2_i64)]),
        json!("")
    );
    assert_eq!(substring(&[name.clone(), FunctionArg::field("at")]), json!("llo"));
    assert_eq!(substring(&[name.clone(), FunctionArg::field("zero")]), json!(""));

    let locate = |position: FunctionArg| {
        evaluate("LOCATE", &[FunctionArg::lit("l"), name.clone(), position], &doc)
    };
    assert_eq!(locate(FunctionArg::lit(0_i64)), json!(0));
    assert_eq!(locate(FunctionArg::lit(-1_i64)), json!(0));
    assert_eq!(locate(FunctionArg::field("zero")), json!(0));
    assert_eq!(locate(FunctionArg::lit(4_i64)), json!(4));
}

#[test]
fn left_and_right() {
    let doc = json!({"word": "hello"});
    let word = FunctionArg::field("word");
    assert_eq!(
        evaluate("RIGHT", &[word.clone(), FunctionArg::lit(3_i64)], &doc),
        json!("llo")
    );
    assert_eq!(
        evaluate("LEFT", &[word.clone(), FunctionArg::lit(2_i64)], &doc),
        json!("he")
    );
    assert_eq!(
        evaluate("RIGHT", &[word, FunctionArg::lit(10_i64)], &doc),
        json!("hello")
    );
}

#[test]
fn concat_ws_interleaves_separator() {
    let doc = json!({"a": "x", "b": "y"});
    assert_eq!(
        evaluate(
            "CONCAT_WS",
            &[FunctionArg::lit("-"), FunctionArg::field("a"), FunctionArg::field("b")],
            &doc
        ),
        json!("x-y")
    );
}

#[test]
fn nested_calls_evaluate_inside_out() {
    let call = parse_call("LOWER(CONCAT(UPPER(a), b))").unwrap();
    let expr = call.map().unwrap().into_expression().unwrap();
    assert_eq!(
        eval::evaluate(&expr, &json!({"a": "Ab", "b": "Cd"})).unwrap(),
        json!("abcd")
    );
}

#[test]
fn math_over_documents() {
    let doc = json!({"price": 1.23456, "n": -4});
    assert_eq!(
        evaluate("ROUND", &[FunctionArg::field("price"), FunctionArg::lit(2_i64)], &doc),
        json!(1.23)
    );
    assert_eq!(evaluate("ABS", &[FunctionArg::field("n")], &doc), json!(4));
    assert_eq!(evaluate("SIGN", &[FunctionArg::field("n")], &doc), json!(-1));
    assert_eq!(
        evaluate("LOG", &[FunctionArg::lit(2_i64), FunctionArg::lit(8_i64)], &doc),
        json!(3)
    );
}

// ===================================================================
// Client-side markers
// ===================================================================

#[test]
fn client_side_functions_produce_markers() {
    let output = map_function("MD5", &[FunctionArg::field("password")]).unwrap();
    assert!(matches!(output, FunctionOutput::ClientSide(_)));
    assert_eq!(
        output.to_json(),
        json!({"type": "MD5", "args": [{"field": "password"}]})
    );
}

#[test]
fn client_side_inside_server_side_is_rejected() {
    let err = parse_call("UPPER(MD5(name))").unwrap().map().unwrap_err();
    assert_eq!(
        err,
        TranslateError::NestedClientSide {
            outer: "UPPER",
            inner: "MD5"
        }
    );
}

#[test]
fn server_side_inside_client_side_is_allowed() {
    let call = FunctionCall::new(
        "SHA2",
        vec![
            FunctionArg::Call(FunctionCall::new("LOWER", vec![FunctionArg::field("email")])),
            FunctionArg::lit(256_i64),
        ],
    );
    let FunctionOutput::ClientSide(marker) = call.map().unwrap() else {
        panic!("expected a marker");
    };
    let upper = eval::evaluate_client(&marker, &json!({"email": "ABC"})).unwrap();
    let lower = eval::evaluate_client(&marker, &json!({"email": "abc"})).unwrap();
    assert_eq!(upper, lower);
}

#[test]
fn match_needs_against() {
    let output = map_function("MATCH", &[FunctionArg::field("title")]).unwrap();
    assert_eq!(
        output,
        FunctionOutput::RequiresPairing {
            columns: vec!["title".to_string()]
        }
    );
    let err = parse_call("UPPER(MATCH(title))").unwrap().map().unwrap_err();
    assert_eq!(err, TranslateError::UnpairedMatch { outer: "UPPER" });
}

#[test]
fn malformed_call_text() {
    for text in ["UPPER(", "UPPER(a) extra", "(a)"] {
        assert!(parse_call(text).is_err(), "{text}");
    }
}
