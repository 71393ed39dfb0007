//! Stage constructors for the request pipeline.
//!
//! Every constructor captures its immutable inputs (`Arc<CompiledSchema>`, the envelope
//! defaults) once; the returned stages are shared by every request of a route.

use super::core::{Pipeline, Renderer, Stage};
use crate::coerce::coerce;
use crate::context::RequestContext;
use crate::defaults::DefaultSet;
use crate::error::ApiError;
use crate::handler::ApiInstance;
use crate::lineschema::Direction;
use crate::schema::CompiledSchema;
use crate::validator::validate;
use serde_json::Value;
use std::sync::Arc;

/// Per-request state threaded through the stages.
pub struct Exchange {
    pub ctx: RequestContext,
    pub handler: Box<dyn ApiInstance>,
}

impl Exchange {
    pub fn new(ctx: RequestContext, handler: Box<dyn ApiInstance>) -> Self {
        Self { ctx, handler }
    }
}

/// Switches applied when building a route's pipeline.
#[derive(Debug, Clone, Copy)]
pub struct StageOptions {
    pub validate_output: bool,
}

impl Default for StageOptions {
    fn default() -> Self {
        Self {
            validate_output: true,
        }
    }
}

/// Fill absent input fields from the route's default document.
pub fn merge_defaults(schema: Arc<CompiledSchema>) -> Stage<Exchange> {
    let default_json = schema.defaults().document().to_string().into_bytes();
    Stage::new("merge_defaults", move |ex: &mut Exchange, input: Vec<u8>| {
        ex.ctx.log.record_input(&input);
        ex.ctx.log.record_default_json(&default_json);
        let merged = schema.defaults().merge(&input)?;
        ex.ctx.log.record_merged_default(&merged);
        Ok(merged)
    })
}

/// Validate against the schema's JSON Schema; bytes pass through unchanged.
pub fn validate_document(schema: Arc<CompiledSchema>) -> Stage<Exchange> {
    let name = match schema.direction() {
        Direction::In => "validate_input",
        Direction::Out => "validate_output",
    };
    Stage::new(name, move |_ex: &mut Exchange, input: Vec<u8>| {
        validate(&input, &schema)?;
        Ok(input)
    })
}

/// Rewrite string-typed input fields into their declared types.
pub fn coerce_input(schema: Arc<CompiledSchema>) -> Stage<Exchange> {
    Stage::new("coerce_input", move |ex: &mut Exchange, input: Vec<u8>| {
        let formatted = coerce(&input, schema.coercions())?;
        ex.ctx.log.record_formatted_input(&formatted);
        Ok(formatted)
    })
}

/// Populate the handler instance; emits an empty buffer.
pub fn unmarshal() -> Stage<Exchange> {
    Stage::new("unmarshal", |ex: &mut Exchange, input: Vec<u8>| {
        ex.handler.bind(&input)?;
        Ok(Vec::new())
    })
}

/// Call the business function unless the request was cancelled.
pub fn invoke() -> Stage<Exchange> {
    Stage::new("invoke", |ex: &mut Exchange, _input: Vec<u8>| {
        if ex.ctx.is_cancelled() {
            return Err(ApiError::Cancelled);
        }
        ex.handler.invoke(&ex.ctx)?;
        Ok(Vec::new())
    })
}

/// Serialize the handler output.
pub fn marshal() -> Stage<Exchange> {
    Stage::new("marshal", |ex: &mut Exchange, _input: Vec<u8>| {
        let out = ex.handler.marshal()?;
        ex.ctx.log.record_original_out(&out);
        Ok(out)
    })
}

/// Coerce the output to its declared types and drop undeclared fields.
pub fn format_output(schema: Arc<CompiledSchema>) -> Stage<Exchange> {
    Stage::new("format_output", move |_ex: &mut Exchange, input: Vec<u8>| {
        if schema.is_empty() {
            return Ok(input);
        }
        let mut document: Value = serde_json::from_slice(&input)?;
        schema.coercions().apply(&mut document)?;
        if let Some(projection) = schema.projection() {
            projection.apply(&mut document);
        }
        Ok(serde_json::to_vec(&document)?)
    })
}

/// Merge the success envelope defaults into an object output.
///
/// Arrays, strings and numbers have no keys to merge into and are returned as marshaled.
pub fn pack(envelope: Arc<DefaultSet>) -> Stage<Exchange> {
    Stage::new("pack", move |ex: &mut Exchange, input: Vec<u8>| {
        let mut document: Value = serde_json::from_slice(&input)?;
        let out = if document.is_object() {
            envelope.merge_value(&mut document);
            serde_json::to_vec(&document)?
        } else {
            input
        };
        ex.ctx.log.record_out(&out);
        Ok(out)
    })
}

/// The canonical stage list for one route.
pub fn request_pipeline(
    input: &Arc<CompiledSchema>,
    output: &Arc<CompiledSchema>,
    envelope: &Arc<DefaultSet>,
    renderer: Renderer<Exchange>,
    options: StageOptions,
) -> Pipeline<Exchange> {
    let mut stages = vec![
        merge_defaults(Arc::clone(input)),
        validate_document(Arc::clone(input)),
        coerce_input(Arc::clone(input)),
        unmarshal(),
        invoke(),
        marshal(),
        format_output(Arc::clone(output)),
    ];
    if options.validate_output {
        stages.push(validate_document(Arc::clone(output)));
    }
    stages.push(pack(Arc::clone(envelope)));
    Pipeline::new(renderer, stages)
}
