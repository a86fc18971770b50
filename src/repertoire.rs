//! Opening preparation we drill against: a small move tree per player color,
//! built from PGN files.

use std::fs;
use std::io::Read;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use petgraph::Direction;
use petgraph::graph::{Graph, NodeIndex};
use pgn_reader::{RawTag, Reader, Skip, Visitor};
use shakmaty::san::{San, SanPlus};
use shakmaty::{Chess, Color};
use walkdir::WalkDir;

use crate::drill::Drill;
use crate::{DrillError, color_name};

/// Node of an [`OpeningTree`].
pub type NodeId = NodeIndex;

/// Tree of prepared moves rooted at the standard starting position.
///
/// Every non-root node holds the move (in canonical SAN) leading to it. Siblings
/// never share a move, so a line of moves maps to at most one node.
#[derive(Debug, Clone)]
pub struct OpeningTree {
    graph: Graph<Option<SanPlus>, ()>,
    root: NodeId,
}

impl Default for OpeningTree {
    fn default() -> Self {
        Self::new()
    }
}

impl OpeningTree {
    pub fn new() -> Self {
        let mut graph = Graph::new();
        let root = graph.add_node(None);
        Self { graph, root }
    }

    /// The starting position.
    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of moves stored.
    #[inline]
    pub fn len(&self) -> usize {
        self.graph.node_count() - 1
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Children of `id` in the order they were added.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        let mut children: Vec<_> = self
            .graph
            .neighbors_directed(id, Direction::Outgoing)
            .collect();
        children.sort_unstable();
        children
    }

    #[inline]
    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.graph
            .neighbors_directed(id, Direction::Outgoing)
            .next()
            .is_none()
    }

    /// Move leading to `id`; `None` for the root.
    #[inline]
    pub fn san(&self, id: NodeId) -> Option<&SanPlus> {
        self.graph.node_weight(id).and_then(Option::as_ref)
    }

    /// Prepared moves from `id`.
    pub fn replies(&self, id: NodeId) -> impl Iterator<Item = &SanPlus> {
        self.children(id)
            .into_iter()
            .filter_map(move |child| self.san(child))
    }

    /// Child of `id` reached by `san`, ignoring check suffixes.
    pub fn child(&self, id: NodeId, san: &San) -> Option<NodeId> {
        self.graph
            .neighbors_directed(id, Direction::Outgoing)
            .find(|child| self.san(*child).is_some_and(|s| s.san == *san))
    }

    /// Add `san` below `parent`, reusing an existing child with the same move.
    pub fn insert(&mut self, parent: NodeId, san: SanPlus) -> NodeId {
        if let Some(existing) = self.child(parent, &san.san) {
            return existing;
        }
        let node = self.graph.add_node(Some(san));
        self.graph.add_edge(parent, node, ());
        node
    }

    /// Insert a line from the starting position, replaying it to validate and
    /// canonicalize each move. Stops at the first illegal move.
    pub fn insert_line(&mut self, moves: &[SanPlus]) -> NodeId {
        let mut pos = Chess::default();
        let mut node = self.root();
        for san in moves {
            match san.san.to_move(&pos) {
                Ok(mv) => {
                    let canonical = SanPlus::from_move_and_play_unchecked(&mut pos, mv);
                    node = self.insert(node, canonical);
                }
                Err(e) => {
                    log::warn!("Dropping line at illegal move {}: {}", san, e);
                    break;
                }
            }
        }
        node
    }

    /// Follow `moves` from the root.
    pub fn find_line(&self, moves: &[SanPlus]) -> Option<NodeId> {
        moves
            .iter()
            .try_fold(self.root(), |node, san| self.child(node, &san.san))
    }
}

/// Opening preparation for both colors.
#[derive(Debug, Clone, Default)]
pub struct OpeningDatabase {
    white_openings: OpeningTree,
    black_openings: OpeningTree,
}

impl OpeningDatabase {
    /// Load every PGN below `root/white` and `root/black`.
    pub fn load(root: &Path) -> Result<Self, DrillError> {
        let mut db = Self::default();
        for color in Color::ALL {
            let folder = root.join(color_name(color));
            if !folder.is_dir() {
                log::warn!("No {} preparation at {}", color_name(color), folder.display());
                continue;
            }
            for path in pgn_files(&folder) {
                log::debug!("Loading: {}", path.display());
                let loaded = fs::File::open(&path)
                    .map_err(DrillError::from)
                    .and_then(|file| db.add_pgn(color, file));
                if let Err(e) = loaded {
                    log::error!("Failed to load {}: {}", path.display(), e);
                }
            }
        }
        log::info!(
            "Loaded preparation: {} white moves, {} black moves",
            db.white_openings.len(),
            db.black_openings.len()
        );
        Ok(db)
    }

    /// Build preparation from archived games, one folder per user below `root`.
    pub fn load_games(root: &Path, users: &[String], max_plies: usize) -> Self {
        let mut db = Self::default();
        for user in users {
            let folder = root.join(user);
            if !folder.is_dir() {
                log::warn!("No archived games for {} at {}", user, folder.display());
                continue;
            }
            for path in pgn_files(&folder) {
                let loaded = fs::File::open(&path)
                    .map_err(DrillError::from)
                    .and_then(|file| db.add_multigame_pgn(file, user, max_plies));
                match loaded {
                    Ok(games) => log::info!("{}: {} games of {}", path.display(), games, user),
                    Err(e) => log::error!("Failed to add {}: {}", path.display(), e),
                }
            }
        }
        db
    }

    /// Merge every game (variations included) from `reader` into `color`'s tree.
    ///
    /// The source is read in full before anything is merged: on error the tree
    /// is left as it was. Returns how many games were read.
    pub fn add_pgn(&mut self, color: Color, reader: impl Read) -> Result<usize, DrillError> {
        let mut tree = self.graph(color).clone();
        let games = read_pgn(reader, &mut RepertoireBuilder { tree: &mut tree })?;
        *self.graph_mut(color) = tree;
        Ok(games)
    }

    /// Merge the opening of each game `user` played into the tree of the color
    /// they had. Returns how many games were used.
    pub fn add_multigame_pgn(
        &mut self,
        reader: impl Read,
        user: &str,
        max_plies: usize,
    ) -> Result<usize, DrillError> {
        let mut scratch = self.clone();
        let mut builder = GamesBuilder::new(&mut scratch, user, max_plies);
        read_pgn(reader, &mut builder)?;
        let used = builder.used;
        *self = scratch;
        Ok(used)
    }

    #[inline]
    pub fn graph(&self, color: Color) -> &OpeningTree {
        color.fold_wb(&self.white_openings, &self.black_openings)
    }

    #[inline]
    fn graph_mut(&mut self, color: Color) -> &mut OpeningTree {
        match color {
            Color::White => &mut self.white_openings,
            Color::Black => &mut self.black_openings,
        }
    }

    /// Begin drilling `color`'s preparation after `moves`. `None` when the moves
    /// leave the preparation.
    pub fn start_drill(&self, color: Color, moves: &[SanPlus]) -> Option<Drill> {
        Drill::start(self.graph(color), color, moves)
    }
}

fn pgn_files(folder: &Path) -> Vec<PathBuf> {
    let mut files: Vec<_> = WalkDir::new(folder)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

/// Feed every game of `reader` to `visitor`, stopping at the first error.
fn read_pgn<V>(reader: impl Read, visitor: &mut V) -> Result<usize, DrillError>
where
    V: Visitor<Output = Result<(), DrillError>>,
{
    let mut reader = Reader::new(reader);
    let mut games = 0;
    while let Some(game) = reader.read_game(visitor)? {
        game?;
        games += 1;
    }
    Ok(games)
}

/// Cursor into the tree for the line being read.
#[derive(Debug, Clone)]
struct Frame {
    node: NodeId,
    pos: Chess,
    /// Node and position before the last move, where a variation branches off.
    prev: Option<(NodeId, Chess)>,
    valid: bool,
}

impl Frame {
    fn root(node: NodeId) -> Self {
        Self {
            node,
            pos: Chess::default(),
            prev: None,
            valid: true,
        }
    }
}

struct RepertoireBuilder<'a> {
    tree: &'a mut OpeningTree,
}

impl Visitor for RepertoireBuilder<'_> {
    type Tags = ();
    /// Open lines, innermost variation last.
    type Movetext = Vec<Frame>;
    type Output = Result<(), DrillError>;

    fn begin_tags(&mut self) -> ControlFlow<Self::Output, Self::Tags> {
        ControlFlow::Continue(())
    }

    fn tag(
        &mut self,
        _tags: &mut (),
        name: &[u8],
        _value: RawTag<'_>,
    ) -> ControlFlow<Self::Output> {
        if name.eq_ignore_ascii_case(b"FEN") {
            log::warn!("Skipping game from a custom start position");
            return ControlFlow::Break(Ok(()));
        }
        ControlFlow::Continue(())
    }

    fn begin_movetext(&mut self, _tags: ()) -> ControlFlow<Self::Output, Self::Movetext> {
        ControlFlow::Continue(vec![Frame::root(self.tree.root())])
    }

    fn san(&mut self, stack: &mut Vec<Frame>, san_plus: SanPlus) -> ControlFlow<Self::Output> {
        let Some(top) = stack.last_mut() else {
            return ControlFlow::Continue(());
        };
        if !top.valid {
            return ControlFlow::Continue(());
        }
        match san_plus.san.to_move(&top.pos) {
            Ok(mv) => {
                let mut pos = top.pos.clone();
                let canonical = SanPlus::from_move_and_play_unchecked(&mut pos, mv);
                let node = self.tree.insert(top.node, canonical);
                top.prev = Some((top.node, std::mem::replace(&mut top.pos, pos)));
                top.node = node;
            }
            Err(e) => {
                log::warn!("Skipping rest of line after {}: {}", san_plus, e);
                top.valid = false;
            }
        }
        ControlFlow::Continue(())
    }

    fn begin_variation(&mut self, stack: &mut Vec<Frame>) -> ControlFlow<Self::Output, Skip> {
        // A variation replaces the last move of the enclosing line.
        let frame = match stack.last() {
            Some(Frame {
                prev: Some((node, pos)),
                valid: true,
                ..
            }) => Frame {
                node: *node,
                pos: pos.clone(),
                prev: None,
                valid: true,
            },
            Some(top) => Frame {
                valid: false,
                ..top.clone()
            },
            None => Frame {
                valid: false,
                ..Frame::root(self.tree.root())
            },
        };
        let skip = Skip(!frame.valid);
        stack.push(frame);
        ControlFlow::Continue(skip)
    }

    fn end_variation(&mut self, stack: &mut Vec<Frame>) -> ControlFlow<Self::Output> {
        if stack.len() < 2 {
            return ControlFlow::Break(Err(DrillError::Pgn(
                "unbalanced closing parenthesis",
            )));
        }
        stack.pop();
        ControlFlow::Continue(())
    }

    fn end_game(&mut self, _stack: Vec<Frame>) -> Self::Output {
        Ok(())
    }
}

/// Player names from a game's tags.
#[derive(Debug, Default)]
struct Players {
    white: Option<String>,
    black: Option<String>,
}

/// Mainline of a game, from the archive owner's side.
#[derive(Debug)]
struct PlayedLine {
    color: Color,
    moves: Vec<SanPlus>,
}

struct GamesBuilder<'a> {
    db: &'a mut OpeningDatabase,
    user: &'a str,
    max_plies: usize,
    used: usize,
}

impl<'a> GamesBuilder<'a> {
    fn new(db: &'a mut OpeningDatabase, user: &'a str, max_plies: usize) -> Self {
        Self {
            db,
            user,
            max_plies,
            used: 0,
        }
    }

    fn user_color(&self, players: &Players) -> Option<Color> {
        let is_user = |name: &Option<String>| {
            name.as_deref()
                .is_some_and(|n| n.eq_ignore_ascii_case(self.user))
        };
        if is_user(&players.white) {
            Some(Color::White)
        } else if is_user(&players.black) {
            Some(Color::Black)
        } else {
            None
        }
    }
}

impl Visitor for GamesBuilder<'_> {
    type Tags = Players;
    type Movetext = PlayedLine;
    type Output = Result<(), DrillError>;

    fn begin_tags(&mut self) -> ControlFlow<Self::Output, Self::Tags> {
        ControlFlow::Continue(Players::default())
    }

    fn tag(
        &mut self,
        players: &mut Players,
        name: &[u8],
        value: RawTag<'_>,
    ) -> ControlFlow<Self::Output> {
        match name {
            b"White" => players.white = Some(value.decode_utf8_lossy().into_owned()),
            b"Black" => players.black = Some(value.decode_utf8_lossy().into_owned()),
            b"FEN" => return ControlFlow::Break(Ok(())),
            _ => {}
        }
        ControlFlow::Continue(())
    }

    fn begin_movetext(&mut self, players: Players) -> ControlFlow<Self::Output, Self::Movetext> {
        match self.user_color(&players) {
            Some(color) => ControlFlow::Continue(PlayedLine {
                color,
                moves: Vec::new(),
            }),
            None => {
                log::debug!("Skipping game without {}", self.user);
                ControlFlow::Break(Ok(()))
            }
        }
    }

    fn san(&mut self, line: &mut PlayedLine, san_plus: SanPlus) -> ControlFlow<Self::Output> {
        if line.moves.len() < self.max_plies {
            line.moves.push(san_plus);
        }
        ControlFlow::Continue(())
    }

    fn begin_variation(&mut self, _line: &mut PlayedLine) -> ControlFlow<Self::Output, Skip> {
        ControlFlow::Continue(Skip(true))
    }

    fn end_game(&mut self, line: PlayedLine) -> Self::Output {
        if !line.moves.is_empty() {
            self.db.graph_mut(line.color).insert_line(&line.moves);
            self.used += 1;
        }
        Ok(())
    }
}
