//! Hash and encryption functions.
//!
//! None of these have a destination operator, so every call becomes a
//! client-side marker carrying its resolved arguments.

use super::{Arity, FunctionSpec, Mapping};
use crate::document::ClientFunction;

pub(super) const FUNCTIONS: &[FunctionSpec] = &[
    FunctionSpec {
        name: "MD5",
        aliases: &[],
        arity: Arity::Exactly(1),
        mapping: Mapping::ClientSide(ClientFunction::Md5),
    },
    FunctionSpec {
        name: "SHA1",
        aliases: &["SHA"],
        arity: Arity::Exactly(1),
        mapping: Mapping::ClientSide(ClientFunction::Sha1),
    },
    FunctionSpec {
        name: "SHA2",
        aliases: &[],
        arity: Arity::Exactly(2),
        mapping: Mapping::ClientSide(ClientFunction::Sha2),
    },
    FunctionSpec {
        name: "AES_ENCRYPT",
        aliases: &[],
        arity: Arity::Exactly(2),
        mapping: Mapping::ClientSide(ClientFunction::AesEncrypt),
    },
    FunctionSpec {
        name: "AES_DECRYPT",
        aliases: &[],
        arity: Arity::Exactly(2),
        mapping: Mapping::ClientSide(ClientFunction::AesDecrypt),
    },
];
