use alloy::{
    json_abi::{Constructor, Event, Fallback, Function, JsonAbi, Receive},
    primitives::{Selector, B256},
};

/// One entry of a contract interface.
#[derive(Debug, Clone, Copy)]
pub enum AbiEntry<'a> {
    Function(&'a Function),
    Event(&'a Event),
    Constructor(&'a Constructor),
    Fallback(&'a Fallback),
    Receive(&'a Receive),
}

impl AbiEntry<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Function(_) => "function",
            Self::Event(_) => "event",
            Self::Constructor(_) => "constructor",
            Self::Fallback(_) => "fallback",
            Self::Receive(_) => "receive",
        }
    }

    /// Name of the entry; constructor, fallback and receive have none.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Function(f) => Some(&f.name),
            Self::Event(e) => Some(&e.name),
            _ => None,
        }
    }
}

/// Parsed contract interface, queryable by name and selector.
///
/// Built once per contract handle and shared read-only by every proxy it
/// hands out.
#[derive(Debug, Clone, Default)]
pub struct AbiRegistry {
    abi: JsonAbi,
}

impl AbiRegistry {
    pub fn new(abi: JsonAbi) -> Self {
        Self { abi }
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json).map(Self::new)
    }

    pub fn abi(&self) -> &JsonAbi {
        &self.abi
    }

    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.abi.functions()
    }

    /// All overloads declared under `name`, in declaration order.
    pub fn functions_named(&self, name: &str) -> &[Function] {
        self.abi.function(name).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn function_by_selector(&self, selector: Selector) -> Option<&Function> {
        self.abi.functions().find(|f| f.selector() == selector)
    }

    pub fn function_by_signature(&self, signature: &str) -> Option<&Function> {
        self.abi.functions().find(|f| f.signature() == signature)
    }

    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.abi.events()
    }

    pub fn events_named(&self, name: &str) -> &[Event] {
        self.abi.event(name).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn event_by_selector(&self, topic: B256) -> Option<&Event> {
        self.abi.events().find(|e| !e.anonymous && e.selector() == topic)
    }

    pub fn event_by_signature(&self, signature: &str) -> Option<&Event> {
        self.abi.events().find(|e| e.signature() == signature)
    }

    pub fn constructor(&self) -> Option<&Constructor> {
        self.abi.constructor.as_ref()
    }

    pub fn fallback(&self) -> Option<&Fallback> {
        self.abi.fallback.as_ref()
    }

    pub fn receive(&self) -> Option<&Receive> {
        self.abi.receive.as_ref()
    }

    pub fn entries(&self) -> impl Iterator<Item = AbiEntry<'_>> {
        self.constructor()
            .map(AbiEntry::Constructor)
            .into_iter()
            .chain(self.functions().map(AbiEntry::Function))
            .chain(self.events().map(AbiEntry::Event))
            .chain(self.fallback().map(AbiEntry::Fallback))
            .chain(self.receive().map(AbiEntry::Receive))
    }
}
