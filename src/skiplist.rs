//! Indexable skip list: a sorted multimap of `(member, score)` with unique
//! members, O(log n) expected insert/remove/rank, and O(1) member->score
//! lookup via a side index.
//!
//! Nodes live in an arena (`Vec<Option<Node>>`) addressed by `usize` index
//! rather than as owning pointers, so back-pointers (needed for the
//! doubly-linked base level) and forward pointers never form a reference
//! cycle. The head is a sentinel with `MAX_HEIGHT` levels, stored separately
//! from the arena since it carries no member/score payload.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

const MAX_HEIGHT: usize = 36;
const HEAD: usize = usize::MAX;

#[derive(Debug, Clone, Copy)]
struct Level {
    forward: Option<usize>,
    span: u64,
}

impl Level {
    fn empty() -> Self {
        Level {
            forward: None,
            span: 0,
        }
    }
}

#[derive(Debug, Clone)]
struct Node {
    member: String,
    score: i64,
    /// Monotonic insertion counter, used only to break score ties in the
    /// ordering search; list order already reflects it since equal-score
    /// members are always appended after their predecessors.
    seq: u64,
    levels: Vec<Level>,
    backward: Option<usize>,
}

pub struct SkipList {
    arena: Vec<Option<Node>>,
    head: Vec<Level>,
    height: usize,
    len: usize,
    index: HashMap<String, usize>,
    next_seq: u64,
    rng: StdRng,
}

impl Default for SkipList {
    fn default() -> Self {
        Self::new()
    }
}

impl SkipList {
    pub fn new() -> Self {
        SkipList {
            arena: Vec::new(),
            head: vec![Level::empty(); MAX_HEIGHT],
            height: 1,
            len: 0,
            index: HashMap::new(),
            next_seq: 0,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn random_height(&mut self) -> usize {
        let mut h = 1;
        while h < MAX_HEIGHT && self.rng.gen::<bool>() {
            h += 1;
        }
        h
    }

    fn node(&self, idx: usize) -> &Node {
        self.arena[idx].as_ref().expect("dangling skip list index")
    }

    fn forward_at(&self, x: usize, level: usize) -> Option<usize> {
        if x == HEAD {
            self.head[level].forward
        } else {
            self.node(x).levels[level].forward
        }
    }

    fn span_at(&self, x: usize, level: usize) -> u64 {
        if x == HEAD {
            self.head[level].span
        } else {
            self.node(x).levels[level].span
        }
    }

    fn set_forward(&mut self, x: usize, level: usize, value: Option<usize>) {
        if x == HEAD {
            self.head[level].forward = value;
        } else {
            self.arena[x].as_mut().unwrap().levels[level].forward = value;
        }
    }

    fn set_span(&mut self, x: usize, level: usize, value: u64) {
        if x == HEAD {
            self.head[level].span = value;
        } else {
            self.arena[x].as_mut().unwrap().levels[level].span = value;
        }
    }

    /// For each level 0..MAX_HEIGHT, the last node strictly ordered before
    /// `(score, seq)` under the (score, seq) total order, plus the rank (the
    /// number of level-0 steps from head to that node).
    fn search_predecessors(&self, score: i64, seq: u64) -> (Vec<usize>, Vec<u64>) {
        let mut update = vec![HEAD; MAX_HEIGHT];
        let mut rank = vec![0u64; MAX_HEIGHT];
        let mut x = HEAD;
        let mut r = 0u64;
        for level in (0..MAX_HEIGHT).rev() {
            loop {
                match self.forward_at(x, level) {
                    Some(fwd) => {
                        let n = self.node(fwd);
                        if (n.score, n.seq) < (score, seq) {
                            r += self.span_at(x, level);
                            x = fwd;
                            continue;
                        }
                        break;
                    }
                    None => break,
                }
            }
            update[level] = x;
            rank[level] = r;
        }
        (update, rank)
    }

    /// Insert or update `member` at `score`. If the member already exists and
    /// either `insert_only` is set or its score is unchanged, returns `false`
    /// without mutating anything. Otherwise the member is (re)inserted and
    /// `true` is returned.
    pub fn add(&mut self, member: &str, score: i64, insert_only: bool) -> bool {
        if let Some(&idx) = self.index.get(member) {
            let existing_score = self.node(idx).score;
            if insert_only || existing_score == score {
                return false;
            }
            self.remove(member);
        }

        let h = self.random_height();
        if h > self.height {
            self.height = h;
        }

        let seq = self.next_seq;
        self.next_seq += 1;

        let (update, rank) = self.search_predecessors(score, seq);

        let mut levels = vec![Level::empty(); h];
        let new_idx = self.arena.len();
        self.arena.push(Some(Node {
            member: member.to_string(),
            score,
            seq,
            levels: Vec::new(),
            backward: None,
        }));

        for level in 0..h {
            let pred = update[level];
            let pred_span = self.span_at(pred, level);
            let steps_from_pred_to_new = rank[0] - rank[level];
            levels[level] = Level {
                forward: self.forward_at(pred, level),
                span: pred_span.saturating_sub(steps_from_pred_to_new),
            };
            self.set_forward(pred, level, Some(new_idx));
            self.set_span(pred, level, steps_from_pred_to_new + 1);
        }
        for level in h..self.height {
            let pred = update[level];
            let s = self.span_at(pred, level);
            self.set_span(pred, level, s + 1);
        }

        let backward = if update[0] == HEAD { None } else { Some(update[0]) };
        self.arena[new_idx].as_mut().unwrap().levels = levels;
        self.arena[new_idx].as_mut().unwrap().backward = backward;

        if let Some(next0) = self.forward_at(new_idx, 0) {
            self.arena[next0].as_mut().unwrap().backward = Some(new_idx);
        }

        self.index.insert(member.to_string(), new_idx);
        self.len += 1;
        true
    }

    pub fn remove(&mut self, member: &str) -> bool {
        let Some(target_idx) = self.index.remove(member) else {
            return false;
        };
        let (score, seq, h, fwd0) = {
            let n = self.node(target_idx);
            (n.score, n.seq, n.levels.len(), n.levels[0].forward)
        };
        let (update, _rank) = self.search_predecessors(score, seq);

        for level in 0..self.height {
            let pred = update[level];
            if level < h {
                let target_level = self.node(target_idx).levels[level];
                let combined = self.span_at(pred, level) + target_level.span;
                self.set_forward(pred, level, target_level.forward);
                self.set_span(pred, level, combined.saturating_sub(1));
            } else {
                let s = self.span_at(pred, level);
                self.set_span(pred, level, s.saturating_sub(1));
            }
        }

        if let Some(next0) = fwd0 {
            let back = self.node(target_idx).backward;
            self.arena[next0].as_mut().unwrap().backward = back;
        }

        while self.height > 1 && self.head[self.height - 1].forward.is_none() {
            self.height -= 1;
        }

        self.arena[target_idx] = None;
        self.len -= 1;
        true
    }

    pub fn get_score(&self, member: &str) -> Option<i64> {
        self.index.get(member).map(|&idx| self.node(idx).score)
    }

    /// 1-based rank of `member`, or `None` if absent.
    pub fn rank(&self, member: &str) -> Option<u64> {
        let &target_idx = self.index.get(member)?;
        let (score, seq) = {
            let n = self.node(target_idx);
            (n.score, n.seq)
        };
        let mut x = HEAD;
        let mut r = 0u64;
        for level in (0..self.height).rev() {
            loop {
                match self.forward_at(x, level) {
                    Some(fwd) if fwd != target_idx => {
                        let n = self.node(fwd);
                        if (n.score, n.seq) < (score, seq) {
                            r += self.span_at(x, level);
                            x = fwd;
                            continue;
                        }
                        break;
                    }
                    _ => break,
                }
            }
        }
        Some(r + 1)
    }

    fn node_idx_at_rank(&self, r: u64) -> Option<usize> {
        if r < 1 || r > self.len as u64 {
            return None;
        }
        let mut x = HEAD;
        let mut acc = 0u64;
        for level in (0..self.height).rev() {
            loop {
                if let Some(fwd) = self.forward_at(x, level) {
                    let span = self.span_at(x, level);
                    if acc + span <= r {
                        acc += span;
                        x = fwd;
                        continue;
                    }
                }
                break;
            }
        }
        if acc == r && x != HEAD {
            Some(x)
        } else {
            None
        }
    }

    /// The member at 1-based `r`, or `None` if out of range.
    pub fn node_at_rank(&self, r: u64) -> Option<(&str, i64)> {
        self.node_idx_at_rank(r).map(|idx| {
            let n = self.node(idx);
            (n.member.as_str(), n.score)
        })
    }

    fn first_at_least(&self, min: i64) -> Option<usize> {
        let mut x = HEAD;
        for level in (0..self.height).rev() {
            loop {
                match self.forward_at(x, level) {
                    Some(fwd) if self.node(fwd).score < min => {
                        x = fwd;
                    }
                    _ => break,
                }
            }
        }
        self.forward_at(x, 0)
    }

    pub fn count_in_score_range(&self, min: i64, max: i64) -> u64 {
        if min > max {
            return 0;
        }
        let mut count = 0u64;
        let mut cur = self.first_at_least(min);
        while let Some(idx) = cur {
            let n = self.node(idx);
            if n.score > max {
                break;
            }
            count += 1;
            cur = n.levels[0].forward;
        }
        count
    }

    pub fn nodes_in_score_range(&self, min: i64, max: i64) -> Vec<(&str, i64)> {
        if min > max {
            return Vec::new();
        }
        let mut out = Vec::new();
        let mut cur = self.first_at_least(min);
        while let Some(idx) = cur {
            let n = self.node(idx);
            if n.score > max {
                break;
            }
            out.push((n.member.as_str(), n.score));
            cur = n.levels[0].forward;
        }
        out
    }

    pub fn nodes_in_rank_range(&self, start: u64, stop: u64) -> Vec<(&str, i64)> {
        if self.len == 0 {
            return Vec::new();
        }
        let start = start.max(1);
        let stop = stop.min(self.len as u64);
        if start > stop {
            return Vec::new();
        }
        let mut out = Vec::new();
        let Some(mut cur_idx) = self.node_idx_at_rank(start) else {
            return out;
        };
        for _ in start..=stop {
            let n = self.node(cur_idx);
            out.push((n.member.as_str(), n.score));
            match n.levels[0].forward {
                Some(next) => cur_idx = next,
                None => break,
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_and_rank_scenario() {
        let mut sl = SkipList::new();
        sl.add("a", 1, false);
        sl.add("b", 3, false);
        sl.add("c", 5, false);
        sl.add("d", 8, false);
        sl.add("e", 12, false);
        sl.add("f", 14, false);

        assert_eq!(sl.count_in_score_range(4, 13), 3);
        let range: Vec<_> = sl
            .nodes_in_score_range(5, 12)
            .into_iter()
            .map(|(m, _)| m.to_string())
            .collect();
        assert_eq!(range, vec!["c", "d", "e"]);
        assert_eq!(sl.rank("c"), Some(3));
    }

    #[test]
    fn rank_matches_iteration_order() {
        let mut sl = SkipList::new();
        for (m, s) in [("a", 5), ("b", 2), ("c", 2), ("d", 9), ("e", 2)] {
            sl.add(m, s, false);
        }
        // b, c, e all score 2: insertion order ties.
        assert_eq!(sl.rank("b"), Some(1));
        assert_eq!(sl.rank("c"), Some(2));
        assert_eq!(sl.rank("e"), Some(3));
        assert_eq!(sl.rank("a"), Some(4));
        assert_eq!(sl.rank("d"), Some(5));
    }

    #[test]
    fn remove_reindexes_ranks() {
        let mut sl = SkipList::new();
        for (m, s) in [("a", 1), ("b", 2), ("c", 3), ("d", 4)] {
            sl.add(m, s, false);
        }
        assert!(sl.remove("b"));
        assert_eq!(sl.len(), 3);
        assert_eq!(sl.rank("c"), Some(2));
        assert_eq!(sl.rank("d"), Some(3));
        assert_eq!(sl.get_score("b"), None);
        assert!(!sl.remove("b"));
    }

    #[test]
    fn insert_only_and_rescoring() {
        let mut sl = SkipList::new();
        assert!(sl.add("a", 1, false));
        assert!(!sl.add("a", 2, true));
        assert_eq!(sl.get_score("a"), Some(1));
        assert!(sl.add("a", 2, false));
        assert_eq!(sl.get_score("a"), Some(2));
    }

    #[test]
    fn node_at_rank_round_trip() {
        let mut sl = SkipList::new();
        for (m, s) in [("a", 1), ("b", 3), ("c", 5), ("d", 8)] {
            sl.add(m, s, false);
        }
        for r in 1..=4u64 {
            let (member, _) = sl.node_at_rank(r).unwrap();
            assert_eq!(sl.rank(member), Some(r));
        }
        assert!(sl.node_at_rank(0).is_none());
        assert!(sl.node_at_rank(5).is_none());
    }

    #[test]
    fn many_inserts_preserve_order() {
        let mut sl = SkipList::new();
        let mut expected: Vec<i64> = (0..500).collect();
        for (i, score) in expected.iter().enumerate() {
            sl.add(&format!("m{i}"), *score, false);
        }
        expected.sort();
        let all = sl.nodes_in_rank_range(1, sl.len() as u64);
        let scores: Vec<i64> = all.iter().map(|(_, s)| *s).collect();
        assert_eq!(scores, expected);
    }
}
