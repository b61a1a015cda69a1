//! The dependency graph between a form's options.
//!
//! An edge runs from an option to every option one of its dependency groups
//! or conditional defaults refers to. Strongly connected components are
//! reported as cycles: the fixpoint over such options may not settle.

use std::fmt;

use petgraph::{
    algo::{is_cyclic_directed, tarjan_scc},
    graphmap::DiGraphMap,
};

use crate::form::{
    Map, SectionId,
    depends::{DependencyGroup, OptionPath},
};

/// An option, addressed by section and position.
type Node = (SectionId, usize);

/// Names one option of a form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct OptionRef {
    /// The owning section.
    pub section: SectionId,
    /// The option name.
    pub option: String,
}

impl fmt::Display for OptionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.section, self.option)
    }
}

/// Dependency edges between the options of a [`Map`].
#[derive(Debug)]
pub struct DependencyGraph {
    graph: DiGraphMap<Node, ()>,
    names: Vec<Vec<String>>,
}

impl DependencyGraph {
    /// Builds the graph from the declared dependencies.
    ///
    /// A local path may refer to an option of any section reading the same
    /// configuration, since sections of different types can govern the same
    /// record.
    #[must_use]
    pub fn new(map: &Map) -> Self {
        let mut graph = DiGraphMap::new();
        let names: Vec<Vec<String>> = map
            .sections()
            .iter()
            .map(|section| section.options().iter().map(|o| o.name().to_string()).collect())
            .collect();

        let configs: Vec<Vec<&str>> = map
            .sections()
            .iter()
            .map(|section| {
                let config = section.config_or(map.config());
                section
                    .options()
                    .iter()
                    .map(|option| option.config_override().unwrap_or(config))
                    .collect()
            })
            .collect();

        let find = |config: &str, name: &str| -> Vec<Node> {
            names
                .iter()
                .enumerate()
                .flat_map(|(s, options)| {
                    options
                        .iter()
                        .enumerate()
                        .filter(move |(_, option)| option.as_str() == name)
                        .map(move |(o, _)| (SectionId(s), o))
                })
                .filter(|&(SectionId(s), o)| configs[s][o] == config)
                .collect()
        };

        for (s, section) in map.sections().iter().enumerate() {
            for (o, option) in section.options().iter().enumerate() {
                let node = (SectionId(s), o);
                graph.add_node(node);

                let groups = option
                    .dependencies()
                    .iter()
                    .chain(option.conditional_defaults().iter().flat_map(|(_, groups)| groups));

                for path in groups.flat_map(DependencyGroup::conditions).map(|(path, _)| path) {
                    let targets = match path {
                        OptionPath::Local(name) => find(configs[s][o], name),
                        OptionPath::Global { config, option, .. } => find(config, option),
                    };
                    for target in targets {
                        graph.add_edge(node, target, ());
                    }
                }
            }
        }

        Self { graph, names }
    }

    /// The number of dependency edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Whether any options depend on each other in a loop.
    #[must_use]
    pub fn has_cycles(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// Returns every dependency cycle, including options depending on
    /// themselves.
    #[must_use]
    pub fn cycles(&self) -> Vec<Vec<OptionRef>> {
        tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || component
                        .first()
                        .is_some_and(|&node| self.graph.contains_edge(node, node))
            })
            .map(|component| {
                let mut cycle: Vec<_> = component
                    .into_iter()
                    .map(|(section, option)| OptionRef {
                        section,
                        option: self.names[section.0][option].clone(),
                    })
                    .collect();
                cycle.sort();
                cycle
            })
            .collect()
    }
}
