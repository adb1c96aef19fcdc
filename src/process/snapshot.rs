use std::collections::{HashMap, HashSet, VecDeque};

/// One row of a process listing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapshotEntry {
    pub pid: u32,
    pub parent_pid: u32,
    pub cpu_percent: f32,
    pub ram_kb: u64,
}

/// A single consistent listing of every process on the host.
///
/// All resource queries for one watch cycle run against the same snapshot so
/// that pid lookups and tree aggregation agree with each other.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    entries: HashMap<u32, SnapshotEntry>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = SnapshotEntry>,
    {
        Self {
            entries: entries.into_iter().map(|e| (e.pid, e)).collect(),
        }
    }

    /// Parse the output of `ps axo pid=,ppid=,pcpu=,rss=`.
    ///
    /// Lines that do not carry four parseable fields (headers, blank lines,
    /// truncated rows) are skipped.
    pub fn parse_ps(output: &str) -> Self {
        Self::from_entries(output.lines().filter_map(parse_ps_line))
    }

    pub fn get(&self, pid: u32) -> Option<&SnapshotEntry> {
        self.entries.get(&pid)
    }

    pub fn contains(&self, pid: u32) -> bool {
        self.entries.contains_key(&pid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All transitive children of `pid`
    pub fn descendants(&self, pid: u32) -> HashSet<u32> {
        let mut children: HashMap<u32, Vec<u32>> = HashMap::new();
        for entry in self.entries.values() {
            // pid 0 on some platforms reports itself as its own parent
            if entry.pid != entry.parent_pid {
                children.entry(entry.parent_pid).or_default().push(entry.pid);
            }
        }

        let mut found = HashSet::new();
        let mut queue = VecDeque::from([pid]);
        while let Some(parent) = queue.pop_front() {
            for &child in children.get(&parent).into_iter().flatten() {
                if child != pid && found.insert(child) {
                    queue.push_back(child);
                }
            }
        }
        found
    }

    /// CPU percentage of `pid`, optionally summed over its descendants.
    /// `None` when `pid` is not in the listing.
    pub fn cpu_usage(&self, pid: u32, include_children: bool) -> Option<f32> {
        self.aggregate(pid, include_children, |e| e.cpu_percent)
    }

    /// Resident memory of `pid` in KiB, optionally summed over its descendants.
    /// `None` when `pid` is not in the listing.
    pub fn ram_usage(&self, pid: u32, include_children: bool) -> Option<u64> {
        self.aggregate(pid, include_children, |e| e.ram_kb)
    }

    fn aggregate<T, F>(&self, pid: u32, include_children: bool, field: F) -> Option<T>
    where
        T: std::iter::Sum<T>,
        F: Fn(&SnapshotEntry) -> T,
    {
        let own = self.entries.get(&pid)?;
        if !include_children {
            return Some(field(own));
        }
        let children = self.descendants(pid);
        Some(
            std::iter::once(own)
                .chain(children.iter().filter_map(|child| self.entries.get(child)))
                .map(field)
                .sum(),
        )
    }
}

fn parse_ps_line(line: &str) -> Option<SnapshotEntry> {
    let mut fields = line.split_whitespace();
    let pid = fields.next()?.parse().ok()?;
    let parent_pid = fields.next()?.parse().ok()?;
    let cpu_percent = parse_decimal(fields.next()?)?;
    let ram_kb = parse_kilobytes(fields.next()?)?;

    Some(SnapshotEntry {
        pid,
        parent_pid,
        cpu_percent,
        ram_kb,
    })
}

/// Locale-tolerant decimal parse: `12,5` and `12.5` are the same value
fn parse_decimal(field: &str) -> Option<f32> {
    let value: f32 = field.replace(',', ".").parse().ok()?;
    value.is_finite().then_some(value)
}

fn parse_kilobytes(field: &str) -> Option<u64> {
    field
        .parse()
        .ok()
        .or_else(|| parse_decimal(field).map(|kb| kb as u64))
}
