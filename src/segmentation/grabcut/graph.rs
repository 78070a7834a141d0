use std::collections::VecDeque;

const NIL: u32 = u32::MAX;
const UNREACHED: u32 = u32::MAX;
const EPSILON: f64 = 1e-9;

/// s/t flow network over `n` nodes solved with Dinic's algorithm.
///
/// Terminal links are folded into a single residual weight per node, so each
/// node is connected to at most one of the two terminals.
pub struct Graph {
    nodes: usize,
    first: Vec<u32>,
    next: Vec<u32>,
    to: Vec<u32>,
    cap: Vec<f64>,
    level: Vec<u32>,
    current: Vec<u32>,
}

impl Graph {
    pub fn new(nodes: usize, edge_hint: usize) -> Self {
        let total = nodes + 2;
        Self {
            nodes,
            first: vec![NIL; total],
            next: Vec::with_capacity(2 * edge_hint),
            to: Vec::with_capacity(2 * edge_hint),
            cap: Vec::with_capacity(2 * edge_hint),
            level: vec![UNREACHED; total],
            current: vec![NIL; total],
        }
    }

    fn source(&self) -> usize {
        self.nodes
    }

    fn sink(&self) -> usize {
        self.nodes + 1
    }

    fn push_arc(&mut self, from: usize, to: usize, cap: f64) {
        let e = self.to.len() as u32;
        self.to.push(to as u32);
        self.cap.push(cap);
        self.next.push(self.first[from]);
        self.first[from] = e;
    }

    /// Undirected-style link: `cap` from `u` to `v`, `rev_cap` back.
    pub fn add_edge(&mut self, u: usize, v: usize, cap: f64, rev_cap: f64) {
        self.push_arc(u, v, cap);
        self.push_arc(v, u, rev_cap);
    }

    /// Cost of cutting `v` from the source (`source_w`) and from the sink
    /// (`sink_w`). Only the difference matters for the cut.
    pub fn add_terminal_weights(&mut self, v: usize, source_w: f64, sink_w: f64) {
        let net = source_w - sink_w;
        if net > 0.0 {
            let s = self.source();
            self.add_edge(s, v, net, 0.0);
        } else if net < 0.0 {
            let t = self.sink();
            self.add_edge(v, t, -net, 0.0);
        }
    }

    /// Push the maximum flow and return its value.
    pub fn max_flow(&mut self) -> f64 {
        let mut flow = 0.0;
        while self.build_levels() {
            self.current.copy_from_slice(&self.first);
            flow += self.blocking_flow();
        }
        self.build_levels();
        flow
    }

    /// After [`Graph::max_flow`]: whether `v` stays connected to the source.
    pub fn in_source_segment(&self, v: usize) -> bool {
        self.level[v] != UNREACHED
    }

    // BFS over residual arcs; true if the sink is reachable.
    fn build_levels(&mut self) -> bool {
        self.level.fill(UNREACHED);
        let s = self.source();
        self.level[s] = 0;
        let mut queue = VecDeque::from([s]);
        while let Some(u) = queue.pop_front() {
            let mut e = self.first[u];
            while e != NIL {
                let v = self.to[e as usize] as usize;
                if self.cap[e as usize] > EPSILON && self.level[v] == UNREACHED {
                    self.level[v] = self.level[u] + 1;
                    queue.push_back(v);
                }
                e = self.next[e as usize];
            }
        }
        self.level[self.sink()] != UNREACHED
    }

    fn blocking_flow(&mut self) -> f64 {
        let (s, t) = (self.source(), self.sink());
        let mut total = 0.0;
        let mut path: Vec<u32> = Vec::new();
        let mut u = s;

        loop {
            if u == t {
                let bottleneck = path
                    .iter()
                    .map(|&e| self.cap[e as usize])
                    .fold(f64::INFINITY, f64::min);
                for &e in &path {
                    self.cap[e as usize] -= bottleneck;
                    self.cap[(e ^ 1) as usize] += bottleneck;
                }
                total += bottleneck;

                // Retreat to the tail of the first saturated arc.
                let saturated = path
                    .iter()
                    .position(|&e| self.cap[e as usize] <= EPSILON)
                    .unwrap_or(0);
                path.truncate(saturated);
                u = path.last().map_or(s, |&e| self.to[e as usize] as usize);
                continue;
            }

            let mut e = self.current[u];
            while e != NIL {
                let v = self.to[e as usize] as usize;
                if self.cap[e as usize] > EPSILON && self.level[v] == self.level[u] + 1 {
                    break;
                }
                e = self.next[e as usize];
            }
            self.current[u] = e;

            if e != NIL {
                path.push(e);
                u = self.to[e as usize] as usize;
                continue;
            }

            // Dead end: prune `u` from this phase and back up.
            if u == s {
                break;
            }
            self.level[u] = UNREACHED;
            match path.pop() {
                Some(e) => {
                    u = self.to[(e ^ 1) as usize] as usize;
                    self.current[u] = self.next[self.current[u] as usize];
                }
                None => break,
            }
        }

        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_flow_is_limited_by_weakest_link() {
        let mut graph = Graph::new(3, 4);
        graph.add_terminal_weights(0, 10.0, 0.0);
        graph.add_edge(0, 1, 4.0, 4.0);
        graph.add_edge(1, 2, 7.0, 7.0);
        graph.add_terminal_weights(2, 0.0, 10.0);

        assert!((graph.max_flow() - 4.0).abs() < 1e-9);
        assert!(graph.in_source_segment(0));
        assert!(!graph.in_source_segment(1));
        assert!(!graph.in_source_segment(2));
    }

    #[test]
    fn parallel_paths_add_up() {
        // s -> 0 -> {1, 2} -> 3 -> t
        let mut graph = Graph::new(4, 6);
        graph.add_terminal_weights(0, 100.0, 0.0);
        graph.add_edge(0, 1, 3.0, 0.0);
        graph.add_edge(0, 2, 5.0, 0.0);
        graph.add_edge(1, 3, 6.0, 0.0);
        graph.add_edge(2, 3, 2.0, 0.0);
        graph.add_edge(1, 2, 1.0, 0.0);
        graph.add_terminal_weights(3, 0.0, 100.0);

        // min cut {0->1 (3), 2->3 (2)} with 1->2 crossing back into the sink side
        assert!((graph.max_flow() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn terminal_weights_only_keep_the_difference() {
        let mut graph = Graph::new(2, 2);
        graph.add_terminal_weights(0, 5.0, 3.0);
        graph.add_terminal_weights(1, 3.0, 5.0);
        graph.add_edge(0, 1, 1.0, 1.0);

        assert!((graph.max_flow() - 1.0).abs() < 1e-9);
        assert!(graph.in_source_segment(0));
        assert!(!graph.in_source_segment(1));
    }
}
