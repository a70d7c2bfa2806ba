//! Line stop chains.
//!
//! A `LineStop` is one station visit by one train on one date. The stops of
//! a single train form a doubly-linked chain. Chains are stored as an arena
//! (`LineStopChain`) where each stop holds the `StopIndex` of its neighbours,
//! so walking backwards from an arrival to find where a train came from is
//! a sequence of index lookups.
//!
//! Chains are immutable once built. Producing a modified chain (for example
//! after backfilling scheduled times) means copying stops into a new
//! `ChainBuilder` and relinking them.

use std::collections::VecDeque;

use chrono::NaiveDate;

use super::{Station, TimeDelay, TrainLine};

/// Position of a stop within a `LineStopChain`.
///
/// # Examples
///
/// ```
/// use raildelays::domain::StopIndex;
///
/// let idx = StopIndex(1);
/// assert_eq!(idx.next(), StopIndex(2));
/// assert_eq!(idx.prev(), Some(StopIndex(0)));
/// assert_eq!(StopIndex(0).prev(), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StopIndex(pub usize);

impl StopIndex {
    /// Returns the next index.
    pub fn next(self) -> Self {
        StopIndex(self.0 + 1)
    }

    /// Returns the previous index, if any.
    pub fn prev(self) -> Option<Self> {
        self.0.checked_sub(1).map(StopIndex)
    }
}

impl std::fmt::Display for StopIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One stop of a train on a given date.
///
/// The `previous` and `next` links are only ever set by `ChainBuilder`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineStop {
    /// Date of circulation
    pub date: NaiveDate,
    /// Station visited
    pub station: Station,
    /// Train calling at the station
    pub train: TrainLine,
    /// Expected arrival time and arrival delay
    pub arrival: TimeDelay,
    /// Expected departure time and departure delay
    pub departure: TimeDelay,
    /// Whether the arrival at this station was canceled
    pub canceled_arrival: bool,
    /// Whether the departure from this station was canceled
    pub canceled_departure: bool,
    previous: Option<StopIndex>,
    next: Option<StopIndex>,
}

impl LineStop {
    /// Creates an unlinked stop with no known times.
    pub fn new(date: NaiveDate, station: Station, train: TrainLine) -> Self {
        Self {
            date,
            station,
            train,
            arrival: TimeDelay::empty(),
            departure: TimeDelay::empty(),
            canceled_arrival: false,
            canceled_departure: false,
            previous: None,
            next: None,
        }
    }

    pub fn with_arrival(mut self, arrival: TimeDelay) -> Self {
        self.arrival = arrival;
        self
    }

    pub fn with_departure(mut self, departure: TimeDelay) -> Self {
        self.departure = departure;
        self
    }

    pub fn with_canceled(mut self, arrival: bool, departure: bool) -> Self {
        self.canceled_arrival = arrival;
        self.canceled_departure = departure;
        self
    }

    /// Index of the previous stop in the same chain.
    pub fn previous(&self) -> Option<StopIndex> {
        self.previous
    }

    /// Index of the next stop in the same chain.
    pub fn next(&self) -> Option<StopIndex> {
        self.next
    }

    /// Returns a copy with both links cleared, ready for a new builder.
    pub fn unlinked(&self) -> Self {
        Self {
            previous: None,
            next: None,
            ..self.clone()
        }
    }
}

/// The stops of one train, linked front to back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineStopChain {
    stops: Vec<LineStop>,
}

impl LineStopChain {
    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    pub fn get(&self, idx: StopIndex) -> Option<&LineStop> {
        self.stops.get(idx.0)
    }

    /// Returns the first stop of the chain.
    pub fn head(&self) -> Option<StopRef<'_>> {
        StopRef::new(self, StopIndex(0))
    }

    /// Returns a cursor on the stop at `idx`.
    pub fn at(&self, idx: StopIndex) -> Option<StopRef<'_>> {
        StopRef::new(self, idx)
    }

    pub fn stops(&self) -> &[LineStop] {
        &self.stops
    }

    /// Iterates over every stop, front to back, as cursors.
    pub fn iter(&self) -> impl Iterator<Item = StopRef<'_>> {
        (0..self.stops.len()).map(move |i| StopRef {
            chain: self,
            index: StopIndex(i),
        })
    }

    /// Returns the first stop at `station`, front to back.
    pub fn find(&self, station: &Station) -> Option<StopRef<'_>> {
        self.iter().find(|s| &s.stop().station == station)
    }
}

/// A borrowed cursor on one stop of a chain.
///
/// Cursors are what get passed around when a stop's neighbours matter: the
/// alternative-train search receives arrival cursors and walks back along
/// `previous` to find the departure side.
#[derive(Debug, Clone, Copy)]
pub struct StopRef<'a> {
    chain: &'a LineStopChain,
    index: StopIndex,
}

impl<'a> StopRef<'a> {
    /// Create a cursor, returning `None` if `index` is out of bounds.
    pub fn new(chain: &'a LineStopChain, index: StopIndex) -> Option<Self> {
        chain.get(index).map(|_| Self { chain, index })
    }

    pub fn index(&self) -> StopIndex {
        self.index
    }

    pub fn chain(&self) -> &'a LineStopChain {
        self.chain
    }

    pub fn stop(&self) -> &'a LineStop {
        &self.chain.stops[self.index.0]
    }

    pub fn previous(&self) -> Option<StopRef<'a>> {
        self.stop()
            .previous
            .and_then(|idx| StopRef::new(self.chain, idx))
    }

    pub fn next(&self) -> Option<StopRef<'a>> {
        self.stop().next.and_then(|idx| StopRef::new(self.chain, idx))
    }

    /// Walks previous-ward, nearest first, excluding this stop.
    pub fn ancestors(&self) -> impl Iterator<Item = StopRef<'a>> + use<'a> {
        std::iter::successors(self.previous(), |s| s.previous())
    }

    /// Walks next-ward, nearest first, excluding this stop.
    pub fn descendants(&self) -> impl Iterator<Item = StopRef<'a>> + use<'a> {
        std::iter::successors(self.next(), |s| s.next())
    }

    /// Whether an expected time this stop's position calls for is unknown.
    ///
    /// Looser than requiring both times on every stop: the first stop of a
    /// chain is never arrived at and the last one is never departed from,
    /// so the origin needs no arrival and the terminus no departure. Every
    /// stop in between needs both.
    pub fn lacks_scheduled_time(&self) -> bool {
        let stop = self.stop();
        (self.previous().is_some() && stop.arrival.expected().is_none())
            || (self.next().is_some() && stop.departure.expected().is_none())
    }

    /// Finds `station` at this stop or any stop before it.
    pub fn find_previous(&self, station: &Station) -> Option<StopRef<'a>> {
        std::iter::once(*self)
            .chain(self.ancestors())
            .find(|s| &s.stop().station == station)
    }
}

/// Builds a `LineStopChain` by growing it at either end.
///
/// The builder starts from an anchor stop. `add_previous` grows the chain
/// towards its origin and `add_next` towards its terminus; links are
/// assigned on `build`.
///
/// # Examples
///
/// ```
/// use raildelays::domain::{ChainBuilder, LineStop, Station, StopIndex, TrainLine};
/// use chrono::NaiveDate;
///
/// let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
/// let train = TrainLine::new(466);
/// let stop = |name: &str| LineStop::new(date, Station::new(name), train);
///
/// let mut builder = ChainBuilder::new(stop("Namur"));
/// builder.add_previous(stop("Liège-Guillemins"));
/// builder.add_next(stop("Brussels-Central"));
/// assert_eq!(builder.anchor(), StopIndex(1));
///
/// let chain = builder.build();
/// let head = chain.head().unwrap();
/// assert_eq!(head.stop().station, Station::new("Liège-Guillemins"));
/// assert_eq!(head.next().unwrap().stop().station, Station::new("Namur"));
/// ```
#[derive(Debug, Clone)]
pub struct ChainBuilder {
    stops: VecDeque<LineStop>,
    anchor: usize,
}

impl ChainBuilder {
    /// Start a chain from its anchor stop.
    pub fn new(anchor: LineStop) -> Self {
        let mut stops = VecDeque::new();
        stops.push_back(anchor.unlinked());
        Self { stops, anchor: 0 }
    }

    /// Append a stop after the current last stop.
    pub fn add_next(&mut self, stop: LineStop) -> &mut Self {
        self.stops.push_back(stop.unlinked());
        self
    }

    /// Prepend a stop before the current first stop.
    pub fn add_previous(&mut self, stop: LineStop) -> &mut Self {
        self.stops.push_front(stop.unlinked());
        self.anchor += 1;
        self
    }

    /// Index the anchor stop will have in the built chain.
    pub fn anchor(&self) -> StopIndex {
        StopIndex(self.anchor)
    }

    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    /// Link the stops in order and freeze them into a chain.
    pub fn build(self) -> LineStopChain {
        let last = self.stops.len().saturating_sub(1);
        let stops = self
            .stops
            .into_iter()
            .enumerate()
            .map(|(i, mut stop)| {
                stop.previous = StopIndex(i).prev();
                stop.next = (i < last).then(|| StopIndex(i).next());
                stop
            })
            .collect();

        LineStopChain { stops }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    fn stop(name: &str) -> LineStop {
        LineStop::new(date(), Station::new(name), TrainLine::new(466))
    }

    fn names(chain: &LineStopChain) -> Vec<String> {
        chain
            .stops()
            .iter()
            .map(|s| s.station.english_name().to_string())
            .collect()
    }

    fn three_stop_chain() -> LineStopChain {
        let mut builder = ChainBuilder::new(stop("A"));
        builder.add_next(stop("B")).add_next(stop("C"));
        builder.build()
    }

    #[test]
    fn stop_index_next_prev() {
        assert_eq!(StopIndex(5).next(), StopIndex(6));
        assert_eq!(StopIndex(5).prev(), Some(StopIndex(4)));
        assert_eq!(StopIndex(0).prev(), None);
    }

    #[test]
    fn builder_links_in_order() {
        let chain = three_stop_chain();
        assert_eq!(names(&chain), vec!["A", "B", "C"]);

        let a = chain.get(StopIndex(0)).unwrap();
        let b = chain.get(StopIndex(1)).unwrap();
        let c = chain.get(StopIndex(2)).unwrap();

        assert_eq!(a.previous(), None);
        assert_eq!(a.next(), Some(StopIndex(1)));
        assert_eq!(b.previous(), Some(StopIndex(0)));
        assert_eq!(b.next(), Some(StopIndex(2)));
        assert_eq!(c.previous(), Some(StopIndex(1)));
        assert_eq!(c.next(), None);
    }

    #[test]
    fn builder_prepends_previous() {
        let mut builder = ChainBuilder::new(stop("B"));
        builder.add_previous(stop("A")).add_next(stop("C"));
        builder.add_previous(stop("Z"));

        assert_eq!(builder.anchor(), StopIndex(2));
        let chain = builder.build();
        assert_eq!(names(&chain), vec!["Z", "A", "B", "C"]);
    }

    #[test]
    fn single_stop_chain_has_no_links() {
        let chain = ChainBuilder::new(stop("A")).build();
        let head = chain.head().unwrap();
        assert!(head.previous().is_none());
        assert!(head.next().is_none());
    }

    #[test]
    fn builder_discards_foreign_links() {
        let chain = three_stop_chain();
        let middle = chain.get(StopIndex(1)).unwrap().clone();

        let rebuilt = ChainBuilder::new(middle).build();
        let only = rebuilt.get(StopIndex(0)).unwrap();
        assert_eq!(only.previous(), None);
        assert_eq!(only.next(), None);
    }

    #[test]
    fn ancestors_and_descendants() {
        let chain = three_stop_chain();
        let b = chain.at(StopIndex(1)).unwrap();

        let before: Vec<_> = b.ancestors().map(|s| s.index()).collect();
        let after: Vec<_> = b.descendants().map(|s| s.index()).collect();
        assert_eq!(before, vec![StopIndex(0)]);
        assert_eq!(after, vec![StopIndex(2)]);

        let c = chain.at(StopIndex(2)).unwrap();
        let before: Vec<_> = c.ancestors().map(|s| s.index()).collect();
        assert_eq!(before, vec![StopIndex(1), StopIndex(0)]);
    }

    #[test]
    fn find_previous_includes_self() {
        let chain = three_stop_chain();
        let c = chain.at(StopIndex(2)).unwrap();

        assert_eq!(
            c.find_previous(&Station::new("C")).map(|s| s.index()),
            Some(StopIndex(2))
        );
        assert_eq!(
            c.find_previous(&Station::new("a")).map(|s| s.index()),
            Some(StopIndex(0))
        );
        assert!(c.find_previous(&Station::new("D")).is_none());

        let a = chain.at(StopIndex(0)).unwrap();
        assert!(a.find_previous(&Station::new("C")).is_none());
    }

    #[test]
    fn out_of_bounds_cursor() {
        let chain = three_stop_chain();
        assert!(chain.at(StopIndex(3)).is_none());
        assert!(LineStopChain::default().head().is_none());
    }

    #[test]
    fn scheduled_time_depends_on_position() {
        let t = chrono::NaiveTime::from_hms_opt(8, 0, 0).unwrap();
        let mut builder = ChainBuilder::new(stop("A").with_departure(TimeDelay::of(t)));
        builder.add_next(stop("B").with_departure(TimeDelay::of(t)));
        builder.add_next(stop("C").with_arrival(TimeDelay::of(t)));
        let chain = builder.build();

        let lacking: Vec<bool> = chain.iter().map(|s| s.lacks_scheduled_time()).collect();
        assert_eq!(lacking, vec![false, true, false]);
    }
}
