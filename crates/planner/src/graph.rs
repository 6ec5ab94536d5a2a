use model::table::QualifiedTable;
use std::collections::{HashMap, HashSet};

/// Foreign-key dependency graph over the selected tables. Edges run
/// from child (referencing) to parent (referenced); execution levels
/// put parents before children so child inserts can see their parents.
#[derive(Debug)]
pub struct DependencyGraph {
    nodes: Vec<QualifiedTable>,
    /// parent key -> children keys, restricted to the selection.
    children: HashMap<String, HashSet<String>>,
    /// node key -> number of selected parents.
    parent_count: HashMap<String, usize>,
}

impl DependencyGraph {
    /// `edges` are (child, parent) pairs; pairs touching tables outside
    /// the selection are ignored.
    pub fn build(
        selection: &[QualifiedTable],
        edges: &[(QualifiedTable, QualifiedTable)],
    ) -> Self {
        let keys: HashSet<String> = selection.iter().map(|t| t.key()).collect();

        let mut children: HashMap<String, HashSet<String>> = HashMap::new();
        let mut parent_count: HashMap<String, usize> =
            selection.iter().map(|t| (t.key(), 0)).collect();

        for (child, parent) in edges {
            let child_key = child.key();
            let parent_key = parent.key();
            if !keys.contains(&child_key) || !keys.contains(&parent_key) {
                continue;
            }
            if children
                .entry(parent_key)
                .or_default()
                .insert(child_key.clone())
            {
                *parent_count.entry(child_key).or_insert(0) += 1;
            }
        }

        Self {
            nodes: selection.to_vec(),
            children,
            parent_count,
        }
    }

    /// Kahn layering. Tables with no selected parents form the first
    /// level; anything still unresolved (cycles, including self
    /// references) is emitted as one final level.
    pub fn execution_levels(&self) -> Vec<Vec<QualifiedTable>> {
        let mut remaining: HashMap<String, usize> = self.parent_count.clone();
        let mut placed: HashSet<String> = HashSet::new();
        let mut levels: Vec<Vec<QualifiedTable>> = Vec::new();

        loop {
            let level: Vec<QualifiedTable> = self
                .nodes
                .iter()
                .filter(|t| {
                    let key = t.key();
                    !placed.contains(&key) && remaining.get(&key).copied() == Some(0)
                })
                .cloned()
                .collect();

            if level.is_empty() {
                break;
            }

            for table in &level {
                let key = table.key();
                placed.insert(key.clone());
                if let Some(kids) = self.children.get(&key) {
                    for child in kids {
                        if let Some(count) = remaining.get_mut(child) {
                            *count = count.saturating_sub(1);
                        }
                    }
                }
            }
            levels.push(level);
        }

        let cycle: Vec<QualifiedTable> = self
            .nodes
            .iter()
            .filter(|t| !placed.contains(&t.key()))
            .cloned()
            .collect();
        if !cycle.is_empty() {
            levels.push(cycle);
        }

        levels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(name: &str) -> QualifiedTable {
        QualifiedTable::parse(name)
    }

    fn keys(level: &[QualifiedTable]) -> Vec<String> {
        let mut keys: Vec<String> = level.iter().map(|t| t.key()).collect();
        keys.sort();
        keys
    }

    #[test]
    fn independent_tables_form_one_level() {
        let selection = vec![t("dbo.A"), t("dbo.B")];
        let graph = DependencyGraph::build(&selection, &[]);

        let levels = graph.execution_levels();
        assert_eq!(levels.len(), 1);
        assert_eq!(keys(&levels[0]), vec!["dbo.a", "dbo.b"]);
    }

    #[test]
    fn parents_precede_children() {
        let selection = vec![t("dbo.Lines"), t("dbo.Orders"), t("dbo.Customers")];
        // Lines -> Orders -> Customers
        let edges = vec![
            (t("dbo.Lines"), t("dbo.Orders")),
            (t("dbo.Orders"), t("dbo.Customers")),
        ];
        let graph = DependencyGraph::build(&selection, &edges);

        let levels = graph.execution_levels();
        assert_eq!(levels.len(), 3);
        assert_eq!(keys(&levels[0]), vec!["dbo.customers"]);
        assert_eq!(keys(&levels[1]), vec!["dbo.orders"]);
        assert_eq!(keys(&levels[2]), vec!["dbo.lines"]);
    }

    #[test]
    fn diamond_resolves_in_two_levels() {
        let selection = vec![t("dbo.C1"), t("dbo.C2"), t("dbo.P")];
        let edges = vec![(t("dbo.C1"), t("dbo.P")), (t("dbo.C2"), t("dbo.P"))];
        let graph = DependencyGraph::build(&selection, &edges);

        let levels = graph.execution_levels();
        assert_eq!(levels.len(), 2);
        assert_eq!(keys(&levels[0]), vec!["dbo.p"]);
        assert_eq!(keys(&levels[1]), vec!["dbo.c1", "dbo.c2"]);
    }

    #[test]
    fn cycles_land_in_a_final_level() {
        let selection = vec![t("dbo.A"), t("dbo.B"), t("dbo.Free")];
        let edges = vec![(t("dbo.A"), t("dbo.B")), (t("dbo.B"), t("dbo.A"))];
        let graph = DependencyGraph::build(&selection, &edges);

        let levels = graph.execution_levels();
        assert_eq!(levels.len(), 2);
        assert_eq!(keys(&levels[0]), vec!["dbo.free"]);
        assert_eq!(keys(&levels[1]), vec!["dbo.a", "dbo.b"]);
    }

    #[test]
    fn edges_outside_selection_are_ignored() {
        let selection = vec![t("dbo.Child")];
        let edges = vec![(t("dbo.Child"), t("dbo.UnselectedParent"))];
        let graph = DependencyGraph::build(&selection, &edges);

        let levels = graph.execution_levels();
        assert_eq!(levels.len(), 1);
        assert_eq!(keys(&levels[0]), vec!["dbo.child"]);
    }

    #[test]
    fn self_reference_is_treated_as_a_cycle() {
        let selection = vec![t("dbo.Tree")];
        let edges = vec![(t("dbo.Tree"), t("dbo.Tree"))];
        let graph = DependencyGraph::build(&selection, &edges);

        let levels = graph.execution_levels();
        assert_eq!(levels.len(), 1);
        assert_eq!(keys(&levels[0]), vec!["dbo.tree"]);
    }
}
