use std::{collections::HashMap, fmt, str::FromStr};

use crate::{handler::Shape, BiasError, Category, HandlerRef, Registration};

/// One of the three tempi of a gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Init,
    Exec,
    Flush,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Init, Phase::Exec, Phase::Flush];

    const fn index(self) -> usize {
        match self {
            Self::Init => 0,
            Self::Exec => 1,
            Self::Flush => 2,
        }
    }

    /// Init and exec handlers decide whether they consumed the event; flush
    /// handlers are plain actions.
    pub fn shape(self) -> Shape {
        match self {
            Self::Init | Self::Exec => Shape::Stage,
            Self::Flush => Shape::Action,
        }
    }
}

/// A stage name: a phase paired with the event category it handles.
///
/// The vocabulary is closed: `{init, exec, flush} x {"", Keyboard, Click,
/// Motion, DOF1, DOF2, DOF3, DOF6}`. The category is also the argument
/// category a handler registered for the stage must declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Stage {
    phase: Phase,
    category: Category,
}

impl Stage {
    pub const NAMES: [&'static str; 24] = [
        "init",
        "initKeyboard",
        "initClick",
        "initMotion",
        "initDOF1",
        "initDOF2",
        "initDOF3",
        "initDOF6",
        "exec",
        "execKeyboard",
        "execClick",
        "execMotion",
        "execDOF1",
        "execDOF2",
        "execDOF3",
        "execDOF6",
        "flush",
        "flushKeyboard",
        "flushClick",
        "flushMotion",
        "flushDOF1",
        "flushDOF2",
        "flushDOF3",
        "flushDOF6",
    ];

    pub const fn new(phase: Phase, category: Category) -> Self {
        Self { phase, category }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Required argument category of handlers registered for this stage.
    pub fn category(&self) -> Category {
        self.category
    }

    pub fn name(&self) -> &'static str {
        Self::NAMES[self.phase.index() * Category::ALL.len() + self.category.index()]
    }

    /// Every stage, in [`Stage::NAMES`] order.
    pub fn all() -> impl Iterator<Item = Stage> {
        Phase::ALL.into_iter().flat_map(|phase| {
            Category::ALL
                .into_iter()
                .map(move |category| Stage::new(phase, category))
        })
    }

    /// Stages consulted, in order, when an event of `category` reaches
    /// `phase`: the exact stage, then `*Motion` for multi-axis events, then
    /// the generic stage.
    pub(crate) fn candidates(phase: Phase, category: Category) -> impl Iterator<Item = Stage> {
        let motion = (category.is_motion() && category != Category::Motion)
            .then_some(Stage::new(phase, Category::Motion));
        let generic = (category != Category::Generic).then_some(Stage::new(phase, Category::Generic));

        std::iter::once(Stage::new(phase, category))
            .chain(motion)
            .chain(generic)
    }
}

impl FromStr for Stage {
    type Err = BiasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .find(|stage| stage.name() == s)
            .ok_or_else(|| BiasError::UnknownStage(s.to_string()))
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Stage → handler map owned by a profile.
pub struct StageTable<G> {
    entries: HashMap<Stage, HandlerRef<G>>,
}

impl<G> StageTable<G> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn insert(&mut self, stage: Stage, handler: HandlerRef<G>) -> Registration {
        match self.entries.insert(stage, handler) {
            Some(previous) => {
                tracing::warn!(stage = stage.name(), previous = previous.name(), "stage handler re-added");
                Registration::Replaced {
                    previous: previous.name().to_string(),
                }
            }
            None => Registration::Added,
        }
    }

    pub fn get(&self, stage: &Stage) -> Option<&HandlerRef<G>> {
        self.entries.get(stage)
    }

    pub fn contains(&self, stage: &Stage) -> bool {
        self.entries.contains_key(stage)
    }

    pub fn remove(&mut self, stage: &Stage) -> Option<HandlerRef<G>> {
        self.entries.remove(stage)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First registered handler among the candidates for `phase`/`category`.
    pub(crate) fn lookup(&self, phase: Phase, category: Category) -> Option<(Stage, &HandlerRef<G>)> {
        Stage::candidates(phase, category)
            .find_map(|stage| self.entries.get(&stage).map(|handler| (stage, handler)))
    }
}

impl<G> Clone for StageTable<G> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<G> Default for StageTable<G> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G> fmt::Debug for StageTable<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.entries.keys().map(Stage::name).collect();
        names.sort_unstable();
        f.debug_struct("StageTable").field("stages", &names).finish()
    }
}
