use crate::accessor::RealtimeAccessor;
use crate::board::{Board, Handle};
use crate::error::{Result, RigError};
use crate::value::Value;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Function producing a computed parameter from other parameters
pub type ComputeFn = Arc<dyn Fn(&RealtimeAccessor) -> Result<Value> + Send + Sync>;

/// How a parameter name is backed
#[derive(Clone)]
pub enum Binding {
    /// Live board location, readable and writable
    Direct { address: String, handle: Handle },
    /// Derived value, read-only
    Computed(ComputeFn),
}

impl Binding {
    pub fn is_direct(&self) -> bool {
        matches!(self, Binding::Direct { .. })
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Direct { address, handle } => f
                .debug_struct("Direct")
                .field("address", address)
                .field("handle", handle)
                .finish(),
            Binding::Computed(_) => f.write_str("Computed"),
        }
    }
}

/// Name to binding table shared by the accessor, the capture controller and
/// the statistics task
///
/// Names are unique across both binding kinds. Entries are never removed or
/// rebound for the lifetime of a session.
pub struct ParameterRegistry {
    board: Arc<dyn Board>,
    bindings: RwLock<BTreeMap<String, Binding>>,
}

impl ParameterRegistry {
    pub fn new(board: Arc<dyn Board>) -> Self {
        Self {
            board,
            bindings: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn board(&self) -> &Arc<dyn Board> {
        &self.board
    }

    /// Resolve `address` on the board once and bind it to `name`
    pub fn register_direct(&self, name: &str, address: &str) -> Result<Handle> {
        self.ensure_vacant(name)?;

        // Resolve outside the lock; the driver call may be slow
        let handle = self.board.handle(address)?;

        let mut bindings = self.bindings.write();
        if bindings.contains_key(name) {
            return Err(RigError::NameAlreadyRegistered {
                name: name.to_string(),
            });
        }
        bindings.insert(
            name.to_string(),
            Binding::Direct {
                address: address.to_string(),
                handle,
            },
        );

        debug!("Registered direct parameter '{}' -> {} ({})", name, address, handle);
        Ok(handle)
    }

    /// Bind `name` to a function of other parameters
    pub fn register_computed<F>(&self, name: &str, compute: F) -> Result<()>
    where
        F: Fn(&RealtimeAccessor) -> Result<Value> + Send + Sync + 'static,
    {
        let mut bindings = self.bindings.write();
        if bindings.contains_key(name) {
            return Err(RigError::NameAlreadyRegistered {
                name: name.to_string(),
            });
        }
        bindings.insert(name.to_string(), Binding::Computed(Arc::new(compute)));

        debug!("Registered computed parameter '{}'", name);
        Ok(())
    }

    /// Look up the binding for `name`
    ///
    /// The returned binding is a clone, so compute functions run without the
    /// registry lock held and may themselves read through the registry.
    pub fn resolve(&self, name: &str) -> Result<Binding> {
        self.bindings
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| RigError::unknown(name))
    }

    /// Whether `name` is a registered board-backed parameter
    pub fn is_writable(&self, name: &str) -> bool {
        self.bindings
            .read()
            .get(name)
            .map(Binding::is_direct)
            .unwrap_or(false)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.read().contains_key(name)
    }

    /// All registered names, sorted
    pub fn names(&self) -> Vec<String> {
        self.bindings.read().keys().cloned().collect()
    }

    pub fn direct_names(&self) -> Vec<String> {
        self.names_where(|b| b.is_direct())
    }

    pub fn computed_names(&self) -> Vec<String> {
        self.names_where(|b| !b.is_direct())
    }

    pub fn len(&self) -> usize {
        self.bindings.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.read().is_empty()
    }

    fn names_where<P: Fn(&Binding) -> bool>(&self, predicate: P) -> Vec<String> {
        self.bindings
            .read()
            .iter()
            .filter(|(_, binding)| predicate(binding))
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn ensure_vacant(&self, name: &str) -> Result<()> {
        if self.bindings.read().contains_key(name) {
            return Err(RigError::NameAlreadyRegistered {
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for ParameterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterRegistry")
            .field("bindings", &*self.bindings.read())
            .finish()
    }
}
