//! Wire format between a runner and its workers.
//!
//! Both directions are bincode. The AST and externals travel as nested
//! byte strings so a worker can reject a malformed program without
//! misreading the rest of the request.
//!
//! Encoding failures surface as `InternalRunner`: they mean the transport
//! broke, not that the program is wrong.

use std::time::Duration;

use quill_eval::errors::internal_runner;
use quill_eval::{Bindings, Environment, EvalError, Externals, Value};
use quill_ir::Program;
use serde::{Deserialize, Serialize};

use crate::{RunRequest, RunResult, RunSuccess};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WireRequest {
    /// bincode-encoded `quill_ir::Program`.
    pub ast: Vec<u8>,
    pub environment: Environment,
    /// bincode-encoded `quill_eval::Externals`.
    pub externals: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum WireResponse {
    Ok {
        result: Value,
        bindings: Bindings,
        exports: Bindings,
        execution_time_us: u64,
    },
    Err {
        error: EvalError,
    },
}

/// A decoded request, ready to evaluate.
pub struct DecodedRequest {
    pub program: Program,
    pub environment: Environment,
    pub externals: Externals,
}

pub fn encode_request(request: &RunRequest) -> Result<Vec<u8>, EvalError> {
    let wire = WireRequest {
        ast: bincode::serialize(request.program.as_ref()).map_err(transport("program"))?,
        environment: request.environment.clone(),
        externals: bincode::serialize(&request.externals).map_err(transport("externals"))?,
    };
    bincode::serialize(&wire).map_err(transport("request"))
}

pub fn decode_request(bytes: &[u8]) -> Result<DecodedRequest, EvalError> {
    let wire: WireRequest = bincode::deserialize(bytes).map_err(transport("request"))?;
    Ok(DecodedRequest {
        program: bincode::deserialize(&wire.ast).map_err(transport("program"))?,
        environment: wire.environment,
        externals: bincode::deserialize(&wire.externals).map_err(transport("externals"))?,
    })
}

pub fn encode_response(result: &RunResult) -> Result<Vec<u8>, EvalError> {
    let wire = match result {
        Ok(success) => WireResponse::Ok {
            result: success.result.clone(),
            bindings: success.bindings.clone(),
            exports: success.exports.clone(),
            execution_time_us: u64::try_from(success.execution_time.as_micros())
                .unwrap_or(u64::MAX),
        },
        Err(error) => WireResponse::Err {
            error: error.clone(),
        },
    };
    bincode::serialize(&wire).map_err(transport("response"))
}

pub fn decode_response(bytes: &[u8]) -> RunResult {
    let wire: WireResponse = bincode::deserialize(bytes).map_err(transport("response"))?;
    match wire {
        WireResponse::Ok {
            result,
            bindings,
            exports,
            execution_time_us,
        } => Ok(RunSuccess {
            result,
            bindings,
            exports,
            execution_time: Duration::from_micros(execution_time_us),
        }),
        WireResponse::Err { error } => Err(error),
    }
}

fn transport(what: &'static str) -> impl Fn(bincode::Error) -> EvalError {
    move |err| internal_runner(format!("failed to transfer {what}: {err}"))
}

#[cfg(test)]
mod tests {
    #![expect(clippy::expect_used, reason = "tests unwrap encoded payloads")]

    use std::sync::Arc;

    use pretty_assertions::assert_eq;
    use quill_eval::errors::runtime_error;
    use quill_eval::EvalErrorKind;

    use super::*;

    #[test]
    fn request_survives_the_wire() {
        let program = quill_parse::parse("x = normal(0, 1)\nexport y = x * 2").expect("parses");
        let mut imported = Bindings::new();
        imported.insert("k".into(), Value::string("v"));
        let request = RunRequest {
            program: Arc::new(program.clone()),
            environment: Environment::default().with_seed("wire"),
            externals: Externals {
                imported,
                ..Externals::default()
            },
        };

        let decoded = decode_request(&encode_request(&request).expect("encodes")).expect("decodes");
        assert_eq!(decoded.program, program);
        assert_eq!(decoded.environment, request.environment);
        assert_eq!(decoded.externals, request.externals);
    }

    #[test]
    fn errors_keep_their_kind_and_span() {
        let error = runtime_error("boom").with_span(quill_ir::Span::new(3, 7));
        let bytes = encode_response(&Err(error.clone())).expect("encodes");
        assert_eq!(decode_response(&bytes).err(), Some(error));
    }

    #[test]
    fn garbage_is_an_internal_runner_error() {
        let err = decode_response(&[0xff, 0xff, 0xff]).err().expect("garbage fails");
        assert!(matches!(err.kind, EvalErrorKind::InternalRunner { .. }));
        assert!(err.is_transient());
    }
}
