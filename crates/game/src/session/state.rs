#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    WaitingForMatch,
    WaitingForRandomNumber,
    WaitingForStart,
    Active,
    Done,
}

impl SessionState {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

/// How a finished session ended. The two cases are messaged differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    GameOver { local_won: bool },
    Disconnected,
}

/// Player indices fixed at election: `local` is this peer's player, `remote`
/// the other one. Index 0 belongs to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexPair {
    pub local: usize,
    pub remote: usize,
}

impl IndexPair {
    pub fn for_role(is_host: bool) -> Self {
        if is_host {
            Self { local: 0, remote: 1 }
        } else {
            Self { local: 1, remote: 0 }
        }
    }

    pub fn is_host(&self) -> bool {
        self.local == 0
    }
}
