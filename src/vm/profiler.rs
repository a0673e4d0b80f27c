use crate::compiler::NodeRef;
use std::collections::{hash_map::Entry, HashMap};

/// Observes every step of the trampoline
pub trait Profiler {
    fn on_node(&mut self, node: NodeRef);
    fn report(&self) -> Option<String> {
        None
    }
}

/// Tallies how many times each kind of node was stepped through
#[derive(Debug, Default)]
pub struct CountingProfiler {
    nodes: HashMap<NodeRef, usize>,
}

impl CountingProfiler {
    pub fn new() -> CountingProfiler {
        CountingProfiler::default()
    }

    pub fn count(&self, node: &str) -> usize {
        self.nodes
            .iter()
            .find(|(kind, _)| kind.to_string() == node)
            .map(|(_, &count)| count)
            .unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.nodes.values().sum()
    }
}

impl Profiler for CountingProfiler {
    fn on_node(&mut self, node: NodeRef) {
        match self.nodes.entry(node) {
            Entry::Occupied(mut entry) => {
                *entry.get_mut() += 1;
            }
            Entry::Vacant(vacant) => {
                vacant.insert(1);
            }
        }
    }

    fn report(&self) -> Option<String> {
        let total = self.total();

        let mut lines = self.nodes
            .iter()
            .map(|(node, &count)| {
                let line = format!(
                    "{:10}: {:10} steps,  {:2.0}% of total steps\n",
                    node,
                    count,
                    100.0 * (count as f64) / (total as f64)
                );
                (count, line)
            })
            .collect::<Vec<_>>();

        lines.sort_by(|(count1, line1), (count2, line2)| {
            count2.cmp(count1).then_with(|| line1.cmp(line2))
        });

        let mut report = String::new();
        lines.into_iter().for_each(|(_, line)| report += &line);

        Some(report)
    }
}

pub struct NoopProfiler;

impl Profiler for NoopProfiler {
    fn on_node(&mut self, _: NodeRef) {}
}
