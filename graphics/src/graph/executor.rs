//! Per-frame execution of a compiled render graph.

use std::collections::HashMap;

use crate::error::{GraphError, GraphResult};
use crate::types::{Extent2d, ResourceFormat};

use super::compiler::CompiledGraph;
use super::context::RenderContext;
use super::dictionary::Dictionary;
use super::pass::RenderData;
use super::resource_cache::ResourceCache;
use super::PassNode;

/// State shared by every pass of one frame.
pub(crate) struct FrameInput<'a> {
    pub(crate) plan: &'a CompiledGraph,
    pub(crate) cache: &'a ResourceCache,
    pub(crate) dictionary: &'a mut Dictionary,
    pub(crate) default_dims: Extent2d,
    pub(crate) default_format: ResourceFormat,
}

/// Run every pass of the plan in order.
///
/// Resources must already be allocated. The first failing pass aborts the
/// frame; commands recorded by earlier passes stay in `ctx`.
pub(crate) fn execute(
    passes: &mut [Option<PassNode>],
    frame: FrameInput<'_>,
    ctx: &mut RenderContext<'_>,
) -> GraphResult<()> {
    let FrameInput {
        plan,
        cache,
        dictionary,
        default_dims,
        default_format,
    } = frame;

    for bindings in &plan.bindings {
        let Some(node) = passes.get_mut(bindings.pass.index()).and_then(Option::as_mut) else {
            continue;
        };

        let resources: HashMap<String, _> = bindings
            .fields
            .iter()
            .filter_map(|(field, handle)| cache.resource(*handle).map(|r| (field.clone(), r.clone())))
            .collect();

        let mut data = RenderData::new(&node.name, resources, default_dims, default_format, dictionary);

        log::trace!("Executing pass '{}'", node.name);
        ctx.begin_pass(&node.name);
        let result = node.pass.execute(ctx, &mut data);
        ctx.end_pass();

        if let Err(source) = result {
            log::error!("Pass '{}' failed, skipping the rest of the frame: {source}", node.name);
            return Err(GraphError::Execution {
                pass: node.name.clone(),
                source,
            });
        }
    }

    Ok(())
}
