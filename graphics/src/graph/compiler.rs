//! Render graph compilation.
//!
//! Turns the pass/edge description of a [`RenderGraph`](super::RenderGraph)
//! into an execution plan. The phases run in this order:
//!
//! 1. **Reflect** every pass with the current default size and format.
//! 2. **Resolve edges**: explicit edges are checked against the new
//!    reflections; required inputs of live passes without an explicit edge
//!    or external resource are connected to the one output of the same
//!    name elsewhere in the graph.
//! 3. **Cycle detection** over explicit and auto-resolved edges.
//! 4. **Dead-node elimination**: only passes that (transitively) feed a
//!    marked output or have side effects survive.
//! 5. **Topological sort** (Kahn). Among ready passes, the one added first
//!    runs first, so identical topologies always produce identical orders.
//! 6. **Format/size propagation** and **bind-flag union** by registering
//!    every field with a staging [`ResourceCache`], merging connected fields.
//! 7. **Pass compile** callbacks with the resolved descriptors.
//!
//! Nothing of the graph's current plan is touched until every phase
//! succeeded; the caller swaps the result in.

use std::collections::{BTreeSet, HashMap, VecDeque};

use crate::error::{GraphError, GraphResult};
use crate::types::{Extent2d, ResourceFormat};

use super::pass::CompileData;
use super::reflection::{Field, RenderPassReflection};
use super::resource_cache::{ResourceCache, ResourceHandle};
use super::{Edge, MarkedOutput, PassId, PassNode};

/// Resources bound to the fields of one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PassBindings {
    pub(crate) pass: PassId,
    pub(crate) fields: Vec<(String, ResourceHandle)>,
}

/// A compiled render graph ready for execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct CompiledGraph {
    /// Pass execution order.
    pub(crate) order: Vec<PassId>,
    /// Edges inferred by name matching.
    pub(crate) auto_edges: Vec<Edge>,
    /// Field bindings, parallel to `order`.
    pub(crate) bindings: Vec<PassBindings>,
}

/// Everything the compiler reads from the graph.
pub(crate) struct CompileInput<'a> {
    pub(crate) passes: &'a mut [Option<PassNode>],
    pub(crate) edges: &'a [Edge],
    pub(crate) outputs: &'a [MarkedOutput],
    pub(crate) default_dims: Extent2d,
    pub(crate) default_format: ResourceFormat,
    pub(crate) transient_aliasing: bool,
}

/// Output of the read-only phases.
struct Analysis {
    plan: CompiledGraph,
    connected: Vec<RenderPassReflection>,
    staged: ResourceCache,
}

/// Compile a render graph into an execution plan and the matching resource
/// records.
pub(crate) fn compile(input: CompileInput<'_>, cache: &ResourceCache) -> GraphResult<(CompiledGraph, ResourceCache)> {
    let CompileInput {
        passes,
        edges,
        outputs,
        default_dims,
        default_format,
        transient_aliasing,
    } = input;

    let compile_data = CompileData::new(default_dims, default_format);
    reflect_all(passes, &compile_data)?;

    let Analysis {
        plan,
        connected,
        staged,
    } = analyze(passes, edges, outputs, cache, default_dims, default_format, transient_aliasing)?;

    for (bindings, connected_resources) in plan.bindings.iter().zip(connected) {
        let Some(node) = passes.get_mut(bindings.pass.index()).and_then(Option::as_mut) else {
            continue;
        };
        let data = CompileData {
            default_dims,
            default_format,
            connected_resources,
        };
        node.pass.compile(&data).map_err(|e| GraphError::Reflection {
            pass: node.name.clone(),
            reason: e.to_string(),
        })?;
    }

    Ok((plan, staged))
}

fn reflect_all(passes: &mut [Option<PassNode>], data: &CompileData) -> GraphResult<()> {
    let mut count = 0;
    for node in passes.iter_mut().flatten() {
        let reflection = node.pass.reflect(data).map_err(|e| GraphError::Reflection {
            pass: node.name.clone(),
            reason: e.to_string(),
        })?;
        reflection.validate().map_err(|reason| GraphError::Reflection {
            pass: node.name.clone(),
            reason,
        })?;
        node.reflection = Some(reflection);
        count += 1;
    }
    log::debug!("Reflected {count} passes");
    Ok(())
}

/// Read-only view of the reflected passes.
struct GraphView<'a> {
    passes: &'a [Option<PassNode>],
    ids: HashMap<&'a str, PassId>,
}

impl<'a> GraphView<'a> {
    fn new(passes: &'a [Option<PassNode>]) -> Self {
        let ids = passes
            .iter()
            .enumerate()
            .filter_map(|(i, node)| node.as_ref().map(|n| (n.name.as_str(), PassId::new(i))))
            .collect();
        Self { passes, ids }
    }

    fn len(&self) -> usize {
        self.passes.len()
    }

    fn id(&self, name: &str) -> GraphResult<PassId> {
        self.ids
            .get(name)
            .copied()
            .ok_or_else(|| GraphError::UnknownPass(name.to_owned()))
    }

    fn node(&self, id: PassId) -> Option<&'a PassNode> {
        self.passes.get(id.index()).and_then(Option::as_ref)
    }

    fn name(&self, id: PassId) -> &'a str {
        self.node(id).map(|n| n.name.as_str()).unwrap_or_default()
    }

    fn fields(&self, id: PassId) -> impl Iterator<Item = &'a Field> + 'a {
        self.node(id)
            .and_then(|n| n.reflection.as_ref())
            .into_iter()
            .flat_map(|r| r.fields())
    }

    fn field(&self, id: PassId, name: &str) -> Option<&'a Field> {
        self.node(id)
            .and_then(|n| n.reflection.as_ref())
            .and_then(|r| r.field(name))
    }

    fn size_ordered_fields(&self, id: PassId) -> GraphResult<Vec<&'a Field>> {
        match self.node(id).and_then(|n| n.reflection.as_ref()) {
            Some(reflection) => reflection.size_order().map_err(|reason| GraphError::Reflection {
                pass: self.name(id).to_owned(),
                reason,
            }),
            None => Ok(Vec::new()),
        }
    }

    fn live_ids(&self) -> impl Iterator<Item = PassId> + '_ {
        self.passes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_some())
            .map(|(i, _)| PassId::new(i))
    }
}

fn analyze(
    passes: &[Option<PassNode>],
    edges: &[Edge],
    outputs: &[MarkedOutput],
    cache: &ResourceCache,
    default_dims: Extent2d,
    default_format: ResourceFormat,
    transient_aliasing: bool,
) -> GraphResult<Analysis> {
    let view = GraphView::new(passes);
    let n = view.len();

    check_explicit_edges(&view, edges, outputs)?;

    // Explicit data sources, keyed by destination field.
    let mut sources: HashMap<(PassId, String), String> = HashMap::new();
    let mut incoming: Vec<Vec<PassId>> = vec![Vec::new(); n];
    for edge in edges {
        let src = view.id(edge.src_pass())?;
        let dst = view.id(edge.dst_pass())?;
        incoming[dst.index()].push(src);
        if let Some(dst_field) = edge.dst_field() {
            sources.insert((dst, dst_field.to_owned()), edge.src());
        }
    }

    // Roots: passes with marked outputs or side effects.
    let mut roots = BTreeSet::new();
    for output in outputs {
        roots.insert(view.id(output.pass())?);
    }
    for id in view.live_ids() {
        if view.node(id).is_some_and(|n| n.pass.has_side_effects()) {
            roots.insert(id);
        }
    }
    if roots.is_empty() {
        log::warn!("Render graph has no marked outputs, nothing will execute");
    }

    // Backward traversal from the roots, resolving inputs on the way.
    let mut live = vec![false; n];
    let mut auto_edges = Vec::new();
    let mut queue: VecDeque<PassId> = roots.into_iter().collect();
    while let Some(id) = queue.pop_front() {
        if live[id.index()] {
            continue;
        }
        live[id.index()] = true;
        queue.extend(incoming[id.index()].iter().copied());

        for field in view.fields(id).filter(|f| f.is_input()) {
            let name = view.name(id);
            if sources.contains_key(&(id, field.name().to_owned())) {
                continue;
            }
            if cache.external(&format!("{name}.{}", field.name())).is_some() {
                continue;
            }

            let candidates: Vec<(PassId, &Field)> = view
                .live_ids()
                .filter(|&other| other != id)
                .filter_map(|other| {
                    view.field(other, field.name())
                        .filter(|f| f.is_output())
                        .map(|f| (other, f))
                })
                .collect();

            match candidates.as_slice() {
                [] if field.is_optional() => {
                    log::warn!("Optional input '{name}.{}' left unbound", field.name());
                }
                [] => {
                    return Err(GraphError::UnresolvedInput {
                        pass: name.to_owned(),
                        field: field.name().to_owned(),
                    });
                }
                [(src, src_field)] => {
                    let edge = Edge::data(view.name(*src), src_field.name(), name, field.name());
                    log::debug!("Auto-resolved edge {edge}");
                    sources.insert((id, field.name().to_owned()), edge.src());
                    incoming[id.index()].push(*src);
                    queue.push_back(*src);
                    auto_edges.push(edge);
                }
                many => {
                    return Err(GraphError::AmbiguousInput {
                        pass: name.to_owned(),
                        field: field.name().to_owned(),
                        candidates: many
                            .iter()
                            .map(|(src, f)| format!("{}.{}", view.name(*src), f.name()))
                            .collect(),
                    });
                }
            }
        }
    }

    // Dependency adjacency (src -> dst), deduplicated and sorted.
    let mut adjacency: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];
    for (dst, srcs) in incoming.iter().enumerate() {
        for src in srcs {
            adjacency[src.index()].insert(dst);
        }
    }

    if let Some(cycle) = find_cycle(&adjacency) {
        return Err(GraphError::CyclicGraph {
            cycle: cycle
                .into_iter()
                .map(|i| view.name(PassId::new(i)).to_owned())
                .collect(),
        });
    }

    let culled: Vec<&str> = view
        .live_ids()
        .filter(|id| !live[id.index()])
        .map(|id| view.name(id))
        .collect();
    if !culled.is_empty() {
        log::debug!("Culled passes not contributing to any output: {culled:?}");
    }

    let order = topological_order(&adjacency, &live)?;
    log::debug!(
        "Execution order: {:?}",
        order.iter().map(|&id| view.name(id)).collect::<Vec<_>>()
    );

    // Format/size propagation in execution order.
    let mut staged = cache.staged();
    let mut bindings = Vec::with_capacity(order.len());
    for (time, &id) in order.iter().enumerate() {
        let name = view.name(id);
        // A field matching another field's size is registered after it.
        let fields = view.size_ordered_fields(id)?;

        let mut bound = Vec::with_capacity(fields.len());
        for field in fields {
            let qualified = format!("{name}.{}", field.name());
            let mut field = field.clone();
            if let Some(reference) = field.size_reference() {
                let reference = format!("{name}.{reference}");
                if !field.specifies_size() {
                    if let Some(referenced) = staged.field_by_name(&reference) {
                        let referenced = referenced.clone();
                        field.copy_size_from(&referenced);
                    }
                }
            }

            let handle = if field.is_input() {
                if let Some(src) = sources.get(&(id, field.name().to_owned())) {
                    Some(staged.register_field(&qualified, &field, time, Some(src))?)
                } else if staged.external(&qualified).is_some() {
                    Some(staged.register_external(&qualified, &field, time)?)
                } else if field.is_output() {
                    Some(staged.register_field(&qualified, &field, time, None)?)
                } else {
                    None
                }
            } else {
                Some(staged.register_field(&qualified, &field, time, None)?)
            };

            if let Some(handle) = handle {
                bound.push((field.name().to_owned(), handle));
            }
        }
        bindings.push(PassBindings { pass: id, fields: bound });
    }

    for output in outputs {
        staged.mark_output(&output.name());
    }
    staged.resolve(default_dims, default_format);
    staged.compute_aliasing(transient_aliasing, order.len());

    // Resolved descriptors handed to the pass compile callbacks.
    let connected = bindings
        .iter()
        .map(|b| {
            let name = view.name(b.pass);
            let mut reflection = RenderPassReflection::new();
            for field in view.fields(b.pass) {
                let resolved = staged
                    .connected_field(&format!("{name}.{}", field.name()), field.name(), field.visibility())
                    .unwrap_or_else(|| field.clone());
                reflection.push(resolved);
            }
            reflection
        })
        .collect();

    Ok(Analysis {
        plan: CompiledGraph {
            order,
            auto_edges,
            bindings,
        },
        connected,
        staged,
    })
}

/// Check explicit edges and marked outputs against the current reflections.
fn check_explicit_edges(view: &GraphView<'_>, edges: &[Edge], outputs: &[MarkedOutput]) -> GraphResult<()> {
    for edge in edges {
        let src = view.id(edge.src_pass())?;
        let dst = view.id(edge.dst_pass())?;
        if let Some(field) = edge.src_field() {
            if !view.field(src, field).is_some_and(Field::is_output) {
                return Err(GraphError::UnknownField {
                    pass: edge.src_pass().to_owned(),
                    field: field.to_owned(),
                    direction: "output",
                });
            }
        }
        if let Some(field) = edge.dst_field() {
            if !view.field(dst, field).is_some_and(Field::is_input) {
                return Err(GraphError::UnknownField {
                    pass: edge.dst_pass().to_owned(),
                    field: field.to_owned(),
                    direction: "input",
                });
            }
        }
    }
    for output in outputs {
        let id = view.id(output.pass())?;
        if !view.field(id, output.field()).is_some_and(Field::is_output) {
            return Err(GraphError::UnknownField {
                pass: output.pass().to_owned(),
                field: output.field().to_owned(),
                direction: "output",
            });
        }
    }
    Ok(())
}

/// Depth-first search for a cycle. Returns the pass indices along the
/// cycle with the first one repeated at the end.
fn find_cycle(adjacency: &[BTreeSet<usize>]) -> Option<Vec<usize>> {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Mark {
        Unvisited,
        OnPath,
        Done,
    }

    fn visit(node: usize, adjacency: &[BTreeSet<usize>], marks: &mut [Mark], path: &mut Vec<usize>) -> Option<Vec<usize>> {
        marks[node] = Mark::OnPath;
        path.push(node);
        for &next in &adjacency[node] {
            match marks[next] {
                Mark::OnPath => {
                    let start = path.iter().position(|&p| p == next)?;
                    let mut cycle = path[start..].to_vec();
                    cycle.push(next);
                    return Some(cycle);
                }
                Mark::Unvisited => {
                    if let Some(cycle) = visit(next, adjacency, marks, path) {
                        return Some(cycle);
                    }
                }
                Mark::Done => {}
            }
        }
        path.pop();
        marks[node] = Mark::Done;
        None
    }

    let mut marks = vec![Mark::Unvisited; adjacency.len()];
    let mut path = Vec::new();
    for node in 0..adjacency.len() {
        if marks[node] == Mark::Unvisited {
            if let Some(cycle) = visit(node, adjacency, &mut marks, &mut path) {
                return Some(cycle);
            }
        }
    }
    None
}

/// Kahn's algorithm over the live passes.
///
/// The ready set is ordered by pass index, so among independent passes the
/// one added to the graph first is scheduled first.
fn topological_order(adjacency: &[BTreeSet<usize>], live: &[bool]) -> GraphResult<Vec<PassId>> {
    let n = adjacency.len();

    // Compute in-degree over live edges only
    let mut in_degree = vec![0u32; n];
    for (src, dsts) in adjacency.iter().enumerate() {
        if !live[src] {
            continue;
        }
        for &dst in dsts {
            if live[dst] {
                in_degree[dst] += 1;
            }
        }
    }

    let mut ready: BTreeSet<usize> = (0..n).filter(|&i| live[i] && in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(n);

    while let Some(node) = ready.pop_first() {
        order.push(PassId::new(node));
        for &dst in &adjacency[node] {
            if !live[dst] {
                continue;
            }
            in_degree[dst] -= 1;
            if in_degree[dst] == 0 {
                ready.insert(dst);
            }
        }
    }

    let live_count = live.iter().filter(|&&l| l).count();
    if order.len() != live_count {
        // Unreachable after cycle detection.
        let remaining = (0..n)
            .filter(|&i| live[i] && in_degree[i] > 0)
            .map(|i| PassId::new(i).to_string())
            .collect();
        return Err(GraphError::CyclicGraph { cycle: remaining });
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adjacency(n: usize, edges: &[(usize, usize)]) -> Vec<BTreeSet<usize>> {
        let mut adj = vec![BTreeSet::new(); n];
        for &(src, dst) in edges {
            adj[src].insert(dst);
        }
        adj
    }

    fn indices(order: &[PassId]) -> Vec<usize> {
        order.iter().map(|id| id.index()).collect()
    }

    #[test]
    fn test_compile_empty() {
        let order = topological_order(&[], &[]).unwrap();
        assert!(order.is_empty());
    }

    #[test]
    fn test_compile_linear_chain() {
        let adj = adjacency(3, &[(0, 1), (1, 2)]);
        let order = topological_order(&adj, &[true; 3]).unwrap();
        assert_eq!(indices(&order), vec![0, 1, 2]);
    }

    #[test]
    fn test_compile_respects_reverse_insertion() {
        // Pass 2 produces for pass 1 which produces for pass 0.
        let adj = adjacency(3, &[(2, 1), (1, 0)]);
        let order = topological_order(&adj, &[true; 3]).unwrap();
        assert_eq!(indices(&order), vec![2, 1, 0]);
    }

    #[test]
    fn test_compile_ties_follow_insertion_order() {
        //     0
        //    / \
        //   3   1
        //    \ /
        //     2
        let adj = adjacency(4, &[(0, 3), (0, 1), (3, 2), (1, 2)]);
        let order = topological_order(&adj, &[true; 4]).unwrap();
        assert_eq!(indices(&order), vec![0, 1, 3, 2]);
    }

    #[test]
    fn test_compile_skips_dead_passes() {
        let adj = adjacency(3, &[(0, 1), (2, 1)]);
        let order = topological_order(&adj, &[true, true, false]).unwrap();
        assert_eq!(indices(&order), vec![0, 1]);
    }

    #[test]
    fn test_find_cycle() {
        let adj = adjacency(3, &[(0, 1), (1, 2), (2, 1)]);
        let cycle = find_cycle(&adj).unwrap();
        assert_eq!(cycle.first(), cycle.last());
        assert_eq!(cycle.len(), 3);
        assert!(cycle.contains(&1) && cycle.contains(&2));
    }

    #[test]
    fn test_find_cycle_none() {
        let adj = adjacency(3, &[(0, 1), (0, 2), (1, 2)]);
        assert!(find_cycle(&adj).is_none());
    }

    #[test]
    fn test_self_loop_is_cycle() {
        let adj = adjacency(1, &[(0, 0)]);
        assert_eq!(find_cycle(&adj), Some(vec![0, 0]));
    }
}
