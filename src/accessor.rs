use crate::board::Board;
use crate::error::{Result, RigError};
use crate::registry::{Binding, ParameterRegistry};
use crate::value::{Reading, Selection, Value};
use std::sync::Arc;
use tracing::{debug, trace};

/// Batched get/set dispatch over the parameter registry
///
/// Direct parameters go straight to the board, computed parameters call their
/// function with this accessor. Batches are processed in order and stop at
/// the first failure.
#[derive(Clone)]
pub struct RealtimeAccessor {
    registry: Arc<ParameterRegistry>,
}

impl RealtimeAccessor {
    pub fn new(registry: Arc<ParameterRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ParameterRegistry> {
        &self.registry
    }

    fn board(&self) -> &Arc<dyn Board> {
        self.registry.board()
    }

    /// Read one name or a batch; the reading has the same shape as the selection
    pub fn get<'a, S: Into<Selection<'a>>>(&self, selection: S) -> Result<Reading> {
        match selection.into() {
            Selection::One(name) => self.get_one(name).map(Reading::One),
            Selection::Many(names) => self.get_many(&names).map(Reading::Many),
        }
    }

    pub fn get_one(&self, name: &str) -> Result<Value> {
        match self.registry.resolve(name)? {
            Binding::Direct { handle, .. } => {
                let value = self.board().read(handle)?;
                trace!("Read '{}' = {:?}", name, value);
                Ok(value)
            }
            Binding::Computed(compute) => compute(self),
        }
    }

    /// Read names in order, failing on the first unknown name or failed read
    pub fn get_many(&self, names: &[&str]) -> Result<Vec<Value>> {
        names.iter().map(|name| self.get_one(name)).collect()
    }

    /// Convenience for scalar reads used by computed parameters
    pub fn get_scalar(&self, name: &str) -> Result<f64> {
        self.get_one(name)?.as_scalar(name)
    }

    pub fn set_one<V: Into<Value>>(&self, name: &str, value: V) -> Result<()> {
        let value = value.into();
        match self.registry.resolve(name)? {
            Binding::Direct { handle, .. } => {
                self.board().write(handle, &value)?;
                trace!("Wrote '{}' = {:?}", name, value);
                Ok(())
            }
            Binding::Computed(_) => Err(RigError::ReadOnlyParameter {
                name: name.to_string(),
            }),
        }
    }

    /// Write values to names paired by position
    ///
    /// Not atomic: writes issued before a failing entry stay applied on the
    /// board and are not rolled back.
    pub fn set_many(&self, names: &[&str], values: Vec<Value>) -> Result<()> {
        if names.len() != values.len() {
            return Err(RigError::LengthMismatch {
                names: names.len(),
                values: values.len(),
            });
        }

        for (index, (name, value)) in names.iter().zip(values).enumerate() {
            if let Err(e) = self.set_one(name, value) {
                debug!(
                    "Batch write stopped at entry {} ('{}'); {} earlier writes remain applied",
                    index, name, index
                );
                return Err(e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::SimulatedBoard;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn setup() -> (Arc<SimulatedBoard>, RealtimeAccessor) {
        let board = Arc::new(
            SimulatedBoard::new()
                .with_value("Addr/X", 5.0)
                .with_value("Addr/Y", 1.0)
                .with_value("Addr/Z", 2.0),
        );
        let registry = Arc::new(ParameterRegistry::new(board.clone()));
        registry.register_direct("x", "Addr/X").unwrap();
        registry.register_direct("y", "Addr/Y").unwrap();
        registry.register_direct("z", "Addr/Z").unwrap();
        registry
            .register_computed("x2", |a| Ok(Value::Scalar(a.get_scalar("x")? * 2.0)))
            .unwrap();
        (board, RealtimeAccessor::new(registry))
    }

    #[test]
    fn test_direct_and_computed_batch_read() {
        let (_board, accessor) = setup();
        let values = accessor.get_many(&["x", "x2"]).unwrap();
        assert_eq!(values, vec![Value::Scalar(5.0), Value::Scalar(10.0)]);
    }

    #[test]
    fn test_computed_write_is_rejected() {
        let (_board, accessor) = setup();
        assert!(matches!(
            accessor.set_one("x2", 1.0),
            Err(RigError::ReadOnlyParameter { name }) if name == "x2"
        ));
    }

    #[test]
    fn test_read_shape_follows_selection() {
        let (_board, accessor) = setup();
        assert_eq!(accessor.get("x").unwrap(), Reading::One(Value::Scalar(5.0)));
        assert_eq!(
            accessor.get(["x"]).unwrap(),
            Reading::Many(vec![Value::Scalar(5.0)])
        );
    }

    #[test]
    fn test_unknown_name_aborts_batch() {
        let (board, accessor) = setup();
        let before = board.read_count();
        let err = accessor.get_many(&["x", "missing", "y"]).unwrap_err();
        assert!(matches!(err, RigError::UnknownParameter { name } if name == "missing"));
        // only "x" reached the board
        assert_eq!(board.read_count() - before, 1);
    }

    #[test]
    fn test_computed_function_not_invoked_on_write() {
        let board = Arc::new(SimulatedBoard::new());
        let registry = Arc::new(ParameterRegistry::new(board));
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        registry
            .register_computed("c", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Value::Scalar(1.0))
            })
            .unwrap();
        let accessor = RealtimeAccessor::new(registry);

        assert!(accessor.set_one("c", 3.0).is_err());
        assert!(accessor.set_many(&["c"], vec![Value::Scalar(3.0)]).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_batch_write_is_not_rolled_back() {
        let (board, accessor) = setup();
        let err = accessor
            .set_many(
                &["y", "x2", "z"],
                vec![Value::Scalar(7.0), Value::Scalar(8.0), Value::Scalar(9.0)],
            )
            .unwrap_err();

        assert!(matches!(err, RigError::ReadOnlyParameter { .. }));
        // first write landed, the one after the failure never happened
        assert_eq!(board.value("Addr/Y"), Some(Value::Scalar(7.0)));
        assert_eq!(board.value("Addr/Z"), Some(Value::Scalar(2.0)));
    }

    #[test]
    fn test_batch_write_with_unknown_name() {
        let (board, accessor) = setup();
        let err = accessor
            .set_many(&["z", "nope"], vec![Value::Scalar(4.0), Value::Scalar(0.0)])
            .unwrap_err();
        assert!(matches!(err, RigError::UnknownParameter { .. }));
        assert_eq!(board.value("Addr/Z"), Some(Value::Scalar(4.0)));
    }

    #[test]
    fn test_batch_write_length_mismatch() {
        let (board, accessor) = setup();
        let writes = board.write_count();
        assert!(matches!(
            accessor.set_many(&["x", "y"], vec![Value::Scalar(1.0)]),
            Err(RigError::LengthMismatch { names: 2, values: 1 })
        ));
        assert_eq!(board.write_count(), writes);
    }
}
