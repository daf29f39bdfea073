//! Evaluation of client-side markers.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes128;
use md5::Md5;
use serde_json::{json, Value};
use sha1::Sha1;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use tracing::debug;

use super::{as_int, evaluate, lookup, NULL};
use crate::document::{ClientArg, ClientFunction, ClientSideCall};
use crate::error::{Result, TranslateError};

const BLOCK: usize = 16;

/// Longest string REPEAT or SPACE may build, in bytes. This is MySQL's default
/// `max_allowed_packet`; longer results are `NULL`, as there.
pub const MAX_RESULT_BYTES: usize = 64 * 1024 * 1024;

/// Evaluates a client-side marker against a fetched document.
///
/// Arguments are resolved first: fields are read from `doc`, expression
/// arguments are evaluated, nested markers are evaluated recursively. SQL
/// `NULL` in yields `NULL` out.
///
/// # Errors
///
/// Returns [`TranslateError::ClientEval`] if an argument has an unusable type
/// or decrypted bytes are not text, and propagates errors from expression
/// arguments.
pub fn evaluate_client(call: &ClientSideCall, doc: &Value) -> Result<Value> {
    let function = call.function;
    let args = call
        .args
        .iter()
        .map(|arg| match arg {
            ClientArg::Literal(value) => Ok(value.to_json()),
            ClientArg::Field(path) => Ok(lookup(doc, path).cloned().unwrap_or(Value::Null)),
            ClientArg::Expression(expr) => evaluate(expr, doc),
            ClientArg::Call(inner) => evaluate_client(inner, doc),
        })
        .collect::<Result<Vec<_>>>()?;

    let first = match args.first() {
        Some(value) => text(function, value)?,
        None => None,
    };
    let Some(input) = first else {
        return Ok(Value::Null);
    };
    let second = args.get(1).unwrap_or(&NULL);

    let result = match function {
        ClientFunction::Reverse => json!(input.chars().rev().collect::<String>()),
        ClientFunction::Repeat => match count(function, second)? {
            Some(n) => repeated(&input, n),
            None => Value::Null,
        },
        // SPACE takes the count as its only argument.
        ClientFunction::Space => match count(function, &args[0])? {
            Some(n) => repeated(" ", n),
            None => Value::Null,
        },
        ClientFunction::Md5 => json!(hex(&Md5::digest(input.as_bytes()))),
        ClientFunction::Sha1 => json!(hex(&Sha1::digest(input.as_bytes()))),
        ClientFunction::Sha2 => sha2(input.as_bytes(), as_int(second)),
        ClientFunction::AesEncrypt => match text(function, second)? {
            Some(key) => json!(hex(&aes_encrypt(input.as_bytes(), key.as_bytes()))),
            None => Value::Null,
        },
        ClientFunction::AesDecrypt => match text(function, second)? {
            Some(key) => match aes_decrypt(&input, key.as_bytes()) {
                Some(plain) => json!(String::from_utf8(plain).map_err(|_| fail(
                    function,
                    "decrypted bytes are not valid UTF-8"
                ))?),
                None => Value::Null,
            },
            None => Value::Null,
        },
    };
    Ok(result)
}

fn fail(function: ClientFunction, message: impl Into<String>) -> TranslateError {
    TranslateError::ClientEval {
        function: function.as_str(),
        message: message.into(),
    }
}

/// SQL string conversion: numbers and booleans become their text.
fn text(function: ClientFunction, value: &Value) -> Result<Option<String>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(if *b { "1" } else { "0" }.to_string())),
        other => Err(fail(function, format!("cannot convert {other} to a string"))),
    }
}

/// A repetition count; negative counts are zero.
fn count(function: ClientFunction, value: &Value) -> Result<Option<usize>> {
    if value.is_null() {
        return Ok(None);
    }
    let n = as_int(value).ok_or_else(|| fail(function, format!("expected an integer, got {value}")))?;
    Ok(Some(usize::try_from(n).unwrap_or(0)))
}

/// `input` repeated `n` times, or `NULL` past [`MAX_RESULT_BYTES`].
fn repeated(input: &str, n: usize) -> Value {
    match input.len().checked_mul(n) {
        Some(len) if len <= MAX_RESULT_BYTES => json!(input.repeat(n)),
        _ => {
            debug!(count = n, "repeated string exceeds the result limit");
            Value::Null
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    const DIGITS: &[u8; 16] = b"0123456789abcdef";
    bytes
        .iter()
        .flat_map(|byte| [DIGITS[usize::from(byte >> 4)], DIGITS[usize::from(byte & 0x0f)]])
        .map(char::from)
        .collect()
}

fn unhex(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(text.get(i..i + 2)?, 16).ok())
        .collect()
}

/// `SHA2(str, bits)`: 0 means 256; unsupported lengths are NULL.
fn sha2(input: &[u8], bits: Option<i64>) -> Value {
    match bits {
        Some(224) => json!(hex(&Sha224::digest(input))),
        Some(0 | 256) => json!(hex(&Sha256::digest(input))),
        Some(384) => json!(hex(&Sha384::digest(input))),
        Some(512) => json!(hex(&Sha512::digest(input))),
        _ => Value::Null,
    }
}

/// Folds a key of any length into 16 bytes by XOR, as MySQL does.
fn fold_key(key: &[u8]) -> Aes128 {
    let mut folded = [0u8; BLOCK];
    for (i, byte) in key.iter().enumerate() {
        folded[i % BLOCK] ^= byte;
    }
    Aes128::new(GenericArray::from_slice(&folded))
}

/// AES-128-ECB with PKCS#7 padding.
#[allow(clippy::cast_possible_truncation)]
fn aes_encrypt(plain: &[u8], key: &[u8]) -> Vec<u8> {
    let cipher = fold_key(key);
    let pad = BLOCK - plain.len() % BLOCK;
    let mut data = plain.to_vec();
    data.resize(plain.len() + pad, pad as u8);
    for chunk in data.chunks_exact_mut(BLOCK) {
        cipher.encrypt_block(GenericArray::from_mut_slice(chunk));
    }
    data
}

/// Inverse of [`aes_encrypt`] over hex text; `None` for malformed input or
/// a wrong key (bad padding).
fn aes_decrypt(hex_text: &str, key: &[u8]) -> Option<Vec<u8>> {
    let mut data = unhex(hex_text)?;
    if data.is_empty() || data.len() % BLOCK != 0 {
        return None;
    }
    let cipher = fold_key(key);
    for chunk in data.chunks_exact_mut(BLOCK) {
        cipher.decrypt_block(GenericArray::from_mut_slice(chunk));
    }
    let pad = usize::from(*data.last()?);
    if pad == 0 || pad > BLOCK || data[data.len() - pad..].iter().any(|&b| usize::from(b) != pad) {
        return None;
    }
    data.truncate(data.len() - pad);
    Some(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::{map_function, FunctionArg, FunctionOutput};

    fn marker(name: &str, args: &[FunctionArg]) -> ClientSideCall {
        match map_function(name, args).unwrap() {
            FunctionOutput::ClientSide(call) => call,
            other => panic!("expected a client-side marker, got {other:?}"),
        }
    }

    #[test]
    fn test_string_functions() {
        let doc = json!({"name": "abc", "n": 3});
        let reverse = marker("REVERSE", &[FunctionArg::field("name")]);
        assert_eq!(evaluate_client(&reverse, &doc).unwrap(), json!("cba"));
        let repeat = marker("REPEAT", &[FunctionArg::lit("ab"), FunctionArg::field("n")]);
        assert_eq!(evaluate_client(&repeat, &doc).unwrap(), json!("ababab"));
        let space = marker("SPACE", &[FunctionArg::lit(2_i64)]);
        assert_eq!(evaluate_client(&space, &doc).unwrap(), json!("  "));
        let negative = marker("REPEAT", &[FunctionArg::lit("x"), FunctionArg::lit(-1_i64)]);
        assert_eq!(evaluate_client(&negative, &doc).unwrap(), json!(""));
    }

    #[test]
    fn test_oversized_repeat_is_null() {
        let doc = json!({"s": "ab", "n": 4_611_686_018_427_387_904_i64, "big": 70_000_000});
        let repeat = marker("REPEAT", &[FunctionArg::field("s"), FunctionArg::field("n")]);
        assert_eq!(evaluate_client(&repeat, &doc).unwrap(), Value::Null);
        let space = marker("SPACE", &[FunctionArg::field("big")]);
        assert_eq!(evaluate_client(&space, &doc).unwrap(), Value::Null);
        let limit = i64::try_from(MAX_RESULT_BYTES).unwrap();
        let exact = marker("SPACE", &[FunctionArg::lit(limit)]);
        let spaces = evaluate_client(&exact, &doc).unwrap();
        assert_eq!(spaces.as_str().map(str::len), Some(MAX_RESULT_BYTES));
    }

    #[test]
    fn test_digests() {
        let doc = json!({"pw": "abc"});
        let md5 = marker("MD5", &[FunctionArg::field("pw")]);
        assert_eq!(
            evaluate_client(&md5, &doc).unwrap(),
            json!("900150983cd24fb0d6963f7d28e17f72")
        );
        let sha1 = marker("SHA", &[FunctionArg::field("pw")]);
        assert_eq!(
            evaluate_client(&sha1, &doc).unwrap(),
            json!("a9993e364706816aba3e25717850c26c9cd0d89d")
        );
        let sha256 = marker("SHA2", &[FunctionArg::field("pw"), FunctionArg::lit(0_i64)]);
        assert_eq!(
            evaluate_client(&sha256, &doc).unwrap(),
            json!("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
        let bad = marker("SHA2", &[FunctionArg::field("pw"), FunctionArg::lit(100_i64)]);
        assert_eq!(evaluate_client(&bad, &doc).unwrap(), Value::Null);
    }

    #[test]
    fn test_aes_round_trip() {
        let doc = json!({"secret": "attack at dawn"});
        let encrypt = marker(
            "AES_ENCRYPT",
            &[FunctionArg::field("secret"), FunctionArg::lit("a key longer than sixteen bytes")],
        );
        let cipher_text = evaluate_client(&encrypt, &doc).unwrap();
        let hex_text = cipher_text.as_str().unwrap();
        assert_eq!(hex_text.len(), 32);
        assert!(hex_text.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

        let decrypt = marker(
            "AES_DECRYPT",
            &[FunctionArg::lit(hex_text), FunctionArg::lit("a key longer than sixteen bytes")],
        );
        assert_eq!(evaluate_client(&decrypt, &doc).unwrap(), json!("attack at dawn"));

        let wrong = marker("AES_DECRYPT", &[FunctionArg::lit("zz"), FunctionArg::lit("k")]);
        assert_eq!(evaluate_client(&wrong, &doc).unwrap(), Value::Null);
    }

    #[test]
    fn test_null_in_null_out() {
        let md5 = marker("MD5", &[FunctionArg::field("missing")]);
        assert_eq!(evaluate_client(&md5, &json!({})).unwrap(), Value::Null);
    }

    #[test]
    fn test_nested_marker_and_expression_arguments() {
        let doc = json!({"name": "abc"});
        let nested = marker(
            "MD5",
            &[FunctionArg::Call(crate::functions::FunctionCall::new(
                "UPPER",
                vec![FunctionArg::field("name")],
            ))],
        );
        let upper_md5 = marker("MD5", &[FunctionArg::lit("ABC")]);
        assert_eq!(
            evaluate_client(&nested, &doc).unwrap(),
            evaluate_client(&upper_md5, &doc).unwrap()
        );
    }

    #[test]
    fn test_unusable_argument() {
        let reverse = marker("REVERSE", &[FunctionArg::field("tags")]);
        let err = evaluate_client(&reverse, &json!({"tags": ["a"]})).unwrap_err();
        assert!(matches!(err, TranslateError::ClientEval { function: "REVERSE", .. }));
    }
}
