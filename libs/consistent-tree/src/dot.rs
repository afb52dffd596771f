// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::fmt;

use wasmtime_slab::Id;

use crate::graph::Graph;
use crate::node::Side;
use crate::strategy::Strategy;
use crate::ConsistentTree;

/// Graphviz rendering of a [`ConsistentTree`], returned by [`ConsistentTree::dot`].
///
/// Erased nodes that are still linked are drawn dashed, labelled with their stake count.
pub struct Dot<'a, T, S: Strategy> {
    pub(crate) tree: &'a ConsistentTree<T, S>,
}

fn node_fmt<T: fmt::Debug>(graph: &Graph<T>, f: &mut fmt::Formatter<'_>, id: Id) -> fmt::Result {
    let node = &graph[id];
    let key = id.into_raw();

    if node.tombstone {
        writeln!(
            f,
            r#"  {key} [label="{:?} h={} stakes={}", style=dashed];"#,
            node.value,
            node.height,
            node.stakes()
        )?;
    } else {
        writeln!(
            f,
            r#"  {key} [label="{:?} h={}"];"#,
            node.value, node.height
        )?;
    }

    if let Some(up) = node.parent {
        writeln!(f, r#"  {key} -> {} [label="up", style=dotted];"#, up.into_raw())?;
    }

    for side in [Side::Left, Side::Right] {
        if let Some(child) = node.child(side) {
            writeln!(f, r#"  {key} -> {} [label="{side}"];"#, child.into_raw())?;
            node_fmt(graph, f, child)?;
        }
    }

    Ok(())
}

impl<T: fmt::Debug, S: Strategy> fmt::Display for Dot<'_, T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let graph = self.tree.graph.read();

        f.write_str("digraph {\n")?;
        if let Some(root) = graph.root {
            node_fmt(&graph, f, root)?;
        }
        f.write_str("}\n")
    }
}

impl<T: fmt::Debug, S: Strategy> fmt::Debug for Dot<'_, T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
