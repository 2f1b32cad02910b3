//! The dispatch table: operation name → route.
//!
//! Built once at startup. The gateway's own operations go in first; every
//! engine operation follows. An engine operation whose name is already
//! taken by a local one never becomes reachable.

use std::collections::HashMap;

use crate::{EngineOperation, LocalOp, Requirement};

/// Where a call goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Handled by the gateway itself.
    Local { call: LocalOp, requirement: Requirement },
    /// Forwarded to the engine with the session token stripped.
    PassThrough { requirement: Requirement },
}

impl Route {
    pub fn requirement(&self) -> &Requirement {
        match self {
            Self::Local { requirement, .. } | Self::PassThrough { requirement } => requirement,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DispatchTable {
    routes: HashMap<String, Route>,
}

impl DispatchTable {
    pub fn build(engine_operations: Vec<EngineOperation>) -> Self {
        let mut routes: HashMap<String, Route> = LocalOp::ALL
            .into_iter()
            .map(|op| {
                (
                    op.name().to_string(),
                    Route::Local {
                        call: op,
                        requirement: op.requirement(),
                    },
                )
            })
            .collect();

        for op in engine_operations {
            if routes.contains_key(&op.name) {
                tracing::warn!(
                    operation = %op.name,
                    "engine operation shadowed by a gateway operation"
                );
                continue;
            }
            routes.insert(
                op.name,
                Route::PassThrough {
                    requirement: op.requirement,
                },
            );
        }

        tracing::debug!(routes = routes.len(), "dispatch table built");
        Self { routes }
    }

    pub fn route(&self, operation: &str) -> Option<&Route> {
        self.routes.get(operation)
    }

    /// Every routable operation name, sorted.
    pub fn operations(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetgate_protocol::Permission;

    #[test]
    fn test_build_without_engine_has_local_routes_only() {
        let table = DispatchTable::build(Vec::new());
        assert_eq!(table.len(), LocalOp::ALL.len());
        assert!(matches!(
            table.route("pollEvents"),
            Some(Route::Local { call: LocalOp::PollEvents, .. })
        ));
    }

    #[test]
    fn test_build_adds_engine_pass_through() {
        let table = DispatchTable::build(vec![EngineOperation::requires(
            "getVehicles",
            [Permission::ReadData],
        )]);

        assert_eq!(
            table.route("getVehicles"),
            Some(&Route::PassThrough {
                requirement: Requirement::permissions([Permission::ReadData])
            })
        );
    }

    #[test]
    fn test_build_local_shadows_engine_operation() {
        let table = DispatchTable::build(vec![EngineOperation::undeclared("login")]);

        assert_eq!(table.len(), LocalOp::ALL.len());
        assert!(matches!(table.route("login"), Some(Route::Local { .. })));
    }

    #[test]
    fn test_route_unknown_is_none() {
        let table = DispatchTable::build(Vec::new());
        assert!(table.route("selfDestruct").is_none());
    }

    #[test]
    fn test_operations_sorted() {
        let table = DispatchTable::build(vec![EngineOperation::undeclared("aaa")]);
        let ops = table.operations();
        assert_eq!(ops.first(), Some(&"aaa"));
        assert!(ops.windows(2).all(|w| w[0] <= w[1]));
    }
}
