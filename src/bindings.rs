use crossterm::event::KeyCode;

/// Logical user intents, independent of the keys that trigger them.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Action {
    Connect,
    Disconnect,
    Start,
    CashOut,
    Withdraw,
    Reset,
    Refresh,
    SelectPrev,
    SelectNext,
    PickSelected,
    /// Zero-based door index.
    PickDoor(u64),
    Quit,
}

/// What the current screen offers. A binding is live only while its
/// affordance exists.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Affordances {
    pub connected: bool,
    pub doors: u64,
    pub cash_out: bool,
    pub owner: bool,
    pub reset_supported: bool,
    pub busy: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Requires {
    Nothing,
    Disconnected,
    Connected,
    /// Connected and nothing is in flight.
    Settled,
    /// Doors are rendered and nothing is in flight.
    Doors,
    /// Door `n` (zero-based) is rendered and nothing is in flight.
    Door(u64),
    CashOut,
    Owner,
    Reset,
}

impl Requires {
    fn holds(self, a: &Affordances) -> bool {
        match self {
            Requires::Nothing => true,
            Requires::Disconnected => !a.connected,
            Requires::Connected => a.connected,
            Requires::Settled => a.connected && !a.busy,
            Requires::Doors => a.connected && a.doors > 0 && !a.busy,
            Requires::Door(n) => a.connected && n < a.doors && !a.busy,
            Requires::CashOut => a.connected && a.cash_out,
            Requires::Owner => a.connected && a.owner,
            Requires::Reset => a.connected && a.reset_supported,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Binding {
    pub key: KeyCode,
    pub action: Action,
    pub label: &'static str,
    requires: Requires,
}

const fn bind(key: KeyCode, action: Action, label: &'static str, requires: Requires) -> Binding {
    Binding {
        key,
        action,
        label,
        requires,
    }
}

pub const BINDINGS: &[Binding] = &[
    bind(KeyCode::Char('c'), Action::Connect, "connect", Requires::Disconnected),
    bind(KeyCode::Char('s'), Action::Start, "start", Requires::Connected),
    bind(KeyCode::Left, Action::SelectPrev, "select", Requires::Doors),
    bind(KeyCode::Char('h'), Action::SelectPrev, "select", Requires::Doors),
    bind(KeyCode::Right, Action::SelectNext, "select", Requires::Doors),
    bind(KeyCode::Char('l'), Action::SelectNext, "select", Requires::Doors),
    bind(KeyCode::Enter, Action::PickSelected, "pick", Requires::Doors),
    bind(KeyCode::Char('1'), Action::PickDoor(0), "pick", Requires::Door(0)),
    bind(KeyCode::Char('2'), Action::PickDoor(1), "pick", Requires::Door(1)),
    bind(KeyCode::Char('3'), Action::PickDoor(2), "pick", Requires::Door(2)),
    bind(KeyCode::Char('4'), Action::PickDoor(3), "pick", Requires::Door(3)),
    bind(KeyCode::Char('5'), Action::PickDoor(4), "pick", Requires::Door(4)),
    bind(KeyCode::Char('6'), Action::PickDoor(5), "pick", Requires::Door(5)),
    bind(KeyCode::Char('7'), Action::PickDoor(6), "pick", Requires::Door(6)),
    bind(KeyCode::Char('8'), Action::PickDoor(7), "pick", Requires::Door(7)),
    bind(KeyCode::Char('o'), Action::CashOut, "cash out", Requires::CashOut),
    bind(KeyCode::Char('w'), Action::Withdraw, "withdraw", Requires::Owner),
    bind(KeyCode::Char('x'), Action::Reset, "reset", Requires::Reset),
    bind(KeyCode::Char('r'), Action::Refresh, "refresh", Requires::Connected),
    bind(KeyCode::Char('d'), Action::Disconnect, "disconnect", Requires::Settled),
    bind(KeyCode::Char('q'), Action::Quit, "quit", Requires::Nothing),
    bind(KeyCode::Esc, Action::Quit, "quit", Requires::Nothing),
];

#[derive(Clone, Copy, Debug)]
pub struct BindingTable {
    bindings: &'static [Binding],
}

impl Default for BindingTable {
    fn default() -> Self {
        Self { bindings: BINDINGS }
    }
}

impl BindingTable {
    /// Bindings that are live for the given affordances, in table order.
    pub fn resolve(&self, affordances: &Affordances) -> Vec<&'static Binding> {
        self.bindings
            .iter()
            .filter(|binding| binding.requires.holds(affordances))
            .collect()
    }

    pub fn action_for(&self, key: KeyCode, affordances: &Affordances) -> Option<Action> {
        self.bindings
            .iter()
            .find(|binding| binding.key == key && binding.requires.holds(affordances))
            .map(|binding| binding.action)
    }

    /// One-line key legend, e.g. `c connect | q/Esc quit`.
    pub fn help(&self, affordances: &Affordances) -> String {
        let mut groups: Vec<(&'static str, Vec<String>)> = Vec::new();
        for binding in self.resolve(affordances) {
            let key = key_label(binding.key);
            match groups.iter_mut().find(|(label, _)| *label == binding.label) {
                Some((_, keys)) => keys.push(key),
                None => groups.push((binding.label, vec![key])),
            }
        }
        groups
            .into_iter()
            .map(|(label, keys)| format!("{} {}", keys.join("/"), label))
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

fn key_label(key: KeyCode) -> String {
    match key {
        KeyCode::Char(c) => c.to_string(),
        KeyCode::Left => "←".to_string(),
        KeyCode::Right => "→".to_string(),
        KeyCode::Enter => "Enter".to_string(),
        KeyCode::Esc => "Esc".to_string(),
        other => format!("{other:?}"),
    }
}
