//! Callback dispatch - Lifecycle phase handlers on views
//!
//! Views take part in a navigation through at most one handler per
//! lifecycle phase. Handlers are not discovered by runtime introspection;
//! each view type registers an explicit [`CallbackTable`] once, at
//! start-up, and the [`CallbackRegistry`] caches the tables keyed by the
//! view's concrete runtime type.
//!
//! A handler declares the route parameters it wants as [`RouteParam`]
//! descriptors. At dispatch time each descriptor fetches the parameter's
//! string form from the navigation state's store and converts it to the
//! declared type through its `FromStr` implementation; the converted
//! values arrive as [`CallbackArgs`] in declaration order.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use crate::{NavigationEvent, View};

/// The lifecycle phases a view can handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackPhase {
    /// On the current view, before it is left. Cancellable: the view can
    /// veto the navigation away from it.
    BeforeOutbound,
    /// On the target view, before it is shown. Cancellable: the view can
    /// veto being shown, and parameter conversion failures surface here.
    BeforeInbound,
    /// On the target view, after the navigation committed. Informational,
    /// not cancellable.
    AfterInbound,
}

impl fmt::Display for CallbackPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BeforeOutbound => write!(f, "before-outbound"),
            Self::BeforeInbound => write!(f, "before-inbound"),
            Self::AfterInbound => write!(f, "after-inbound"),
        }
    }
}

/// Why a parameter-to-type conversion failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionReason {
    /// The parameter is absent from the state's store.
    Missing,
    /// The string form did not parse into the declared type.
    Parse(String),
}

/// A declared route parameter could not be bound.
///
/// During inbound dispatch the state machine wraps this as an invalid
/// route, so callers can redirect to a not-found state instead of
/// surfacing a developer-facing failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionError {
    /// The declared parameter name.
    pub param: String,
    /// The declared target type.
    pub target_type: &'static str,
    /// What went wrong.
    pub reason: ConversionReason,
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            ConversionReason::Missing => write!(
                f,
                "route parameter \"{}\" is absent but declared as {}",
                self.param, self.target_type
            ),
            ConversionReason::Parse(source) => write!(
                f,
                "route parameter \"{}\" does not convert to {}: {source}",
                self.param, self.target_type
            ),
        }
    }
}

impl std::error::Error for ConversionError {}

/// Errors from callback registration and dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackError {
    /// A second handler was registered for a phase that already has one.
    MultipleCallbacks {
        /// The view type the table is for.
        view_type: &'static str,
        /// The contested phase.
        phase: CallbackPhase,
        /// Name of the handler already registered.
        existing: String,
        /// Name of the rejected handler.
        rejected: String,
    },
    /// A table for the same view type was registered twice.
    DuplicateTable {
        /// The view type registered twice.
        view_type: &'static str,
    },
    /// A declared route parameter could not be bound.
    Conversion(ConversionError),
}

impl fmt::Display for CallbackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MultipleCallbacks {
                view_type,
                phase,
                existing,
                rejected,
            } => write!(
                f,
                "view type {view_type} already has {phase} handler \"{existing}\"; cannot also register \"{rejected}\""
            ),
            Self::DuplicateTable { view_type } => {
                write!(f, "a callback table for view type {view_type} is already registered")
            }
            Self::Conversion(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for CallbackError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Conversion(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConversionError> for CallbackError {
    fn from(e: ConversionError) -> Self {
        Self::Conversion(e)
    }
}

/// Descriptor for one declared route parameter: a name plus a conversion
/// from the stored string form to the declared type.
pub struct RouteParam {
    name: String,
    target_type: &'static str,
    convert: Box<dyn Fn(&str) -> Result<Box<dyn Any + Send>, String> + Send + Sync>,
}

impl RouteParam {
    /// The declared parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared target type name.
    #[must_use]
    pub fn target_type(&self) -> &'static str {
        self.target_type
    }
}

impl fmt::Debug for RouteParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteParam")
            .field("name", &self.name)
            .field("target_type", &self.target_type)
            .finish_non_exhaustive()
    }
}

/// Declare a route parameter converted through `T`'s [`FromStr`].
///
/// `FromStr` plays the role of a single-string-argument constructor: any
/// type with one can be a declared parameter type.
///
/// # Example
///
/// ```
/// use waymark::route_param;
///
/// let id = route_param::<u64>("id");
/// assert_eq!(id.name(), "id");
/// ```
pub fn route_param<T>(name: impl Into<String>) -> RouteParam
where
    T: FromStr + Send + 'static,
    T::Err: fmt::Display,
{
    RouteParam {
        name: name.into(),
        target_type: std::any::type_name::<T>(),
        convert: Box::new(|raw| {
            raw.parse::<T>()
                .map(|v| Box::new(v) as Box<dyn Any + Send>)
                .map_err(|e| e.to_string())
        }),
    }
}

/// Converted route parameter values, in declaration order.
pub struct CallbackArgs {
    values: Vec<Box<dyn Any + Send>>,
}

impl CallbackArgs {
    /// The value at `index`, downcast to its declared type.
    ///
    /// Returns `None` for an out-of-range index or a wrong type request.
    #[must_use]
    pub fn get<T: 'static>(&self, index: usize) -> Option<&T> {
        self.values.get(index)?.downcast_ref()
    }

    /// Number of bound values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` when no parameters were declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

type HandlerFn = Box<dyn Fn(&mut dyn Any, &mut NavigationEvent, &CallbackArgs) + Send + Sync>;

struct Handler {
    name: String,
    params: Vec<RouteParam>,
    invoke: HandlerFn,
}

/// The handlers one view type declares: at most one per phase.
pub struct CallbackTable {
    view_type: &'static str,
    type_id: TypeId,
    handlers: HashMap<CallbackPhase, Handler>,
}

impl CallbackTable {
    /// Start building a table for view type `V`.
    #[must_use]
    pub fn for_view<V: View>() -> CallbackTableBuilder<V> {
        CallbackTableBuilder {
            table: CallbackTable {
                view_type: std::any::type_name::<V>(),
                type_id: TypeId::of::<V>(),
                handlers: HashMap::new(),
            },
            _marker: PhantomData,
        }
    }

    /// The view type this table was built for.
    #[must_use]
    pub fn view_type(&self) -> &'static str {
        self.view_type
    }

    /// Whether a handler is registered for the phase.
    #[must_use]
    pub fn handles(&self, phase: CallbackPhase) -> bool {
        self.handlers.contains_key(&phase)
    }
}

impl fmt::Debug for CallbackTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackTable")
            .field("view_type", &self.view_type)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

/// Builder for a [`CallbackTable`], typed to the view it serves.
///
/// # Example
///
/// ```
/// use std::any::Any;
/// use waymark::{route_param, CallbackPhase, CallbackTable, View};
///
/// struct UserView {
///     shown: Option<u64>,
/// }
/// impl View for UserView {
///     fn as_any(&self) -> &dyn Any { self }
///     fn as_any_mut(&mut self) -> &mut dyn Any { self }
/// }
///
/// let table = CallbackTable::for_view::<UserView>()
///     .on(CallbackPhase::BeforeInbound, "enter", vec![route_param::<u64>("id")],
///         |view, _event, args| {
///             view.shown = args.get::<u64>(0).copied();
///         })
///     .unwrap()
///     .build();
/// assert!(table.handles(CallbackPhase::BeforeInbound));
/// ```
pub struct CallbackTableBuilder<V> {
    table: CallbackTable,
    _marker: PhantomData<V>,
}

impl<V: View> CallbackTableBuilder<V> {
    /// Register the handler for one phase.
    ///
    /// # Errors
    ///
    /// [`CallbackError::MultipleCallbacks`] if the phase already has a
    /// handler: one handler per phase is the contract, and a silent
    /// overwrite would hide a wiring mistake.
    pub fn on(
        mut self,
        phase: CallbackPhase,
        name: impl Into<String>,
        params: Vec<RouteParam>,
        body: impl Fn(&mut V, &mut NavigationEvent, &CallbackArgs) + Send + Sync + 'static,
    ) -> Result<Self, CallbackError> {
        let name = name.into();
        if let Some(existing) = self.table.handlers.get(&phase) {
            return Err(CallbackError::MultipleCallbacks {
                view_type: self.table.view_type,
                phase,
                existing: existing.name.clone(),
                rejected: name,
            });
        }
        self.table.handlers.insert(
            phase,
            Handler {
                name,
                params,
                invoke: Box::new(move |view, event, args| {
                    // The registry dispatches only on a TypeId hit, so the
                    // downcast always succeeds.
                    if let Some(view) = view.downcast_mut::<V>() {
                        body(view, event, args);
                    }
                }),
            },
        );
        Ok(self)
    }

    /// Finish the table.
    #[must_use]
    pub fn build(self) -> CallbackTable {
        self.table
    }
}

/// Cache of [`CallbackTable`]s, keyed by concrete view type.
///
/// Built once at start-up alongside the sitemap, then shared read-only by
/// every navigator.
#[derive(Default)]
pub struct CallbackRegistry {
    tables: HashMap<TypeId, CallbackTable>,
}

impl CallbackRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a view type's table.
    ///
    /// # Errors
    ///
    /// [`CallbackError::DuplicateTable`] if the view type already has one.
    pub fn register(&mut self, table: CallbackTable) -> Result<(), CallbackError> {
        if self.tables.contains_key(&table.type_id) {
            return Err(CallbackError::DuplicateTable {
                view_type: table.view_type,
            });
        }
        self.tables.insert(table.type_id, table);
        Ok(())
    }

    /// Number of registered tables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Returns `true` when no tables are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Dispatch one phase on a view.
    ///
    /// Looks up the table by the view's concrete runtime type; a view
    /// without a table, or without a handler for this phase, is fine and
    /// dispatches nothing. Declared route parameters are bound from the
    /// event (the previous state's store for the outbound phase, the
    /// target state's store otherwise) before the handler runs.
    ///
    /// # Errors
    ///
    /// [`CallbackError::Conversion`] when a declared parameter is absent
    /// or does not convert.
    pub fn dispatch(
        &self,
        view: &mut dyn View,
        phase: CallbackPhase,
        event: &mut NavigationEvent,
    ) -> Result<(), CallbackError> {
        let type_id = view.as_any().type_id();
        let Some(handler) = self.tables.get(&type_id).and_then(|t| t.handlers.get(&phase))
        else {
            return Ok(());
        };

        let params = match phase {
            CallbackPhase::BeforeOutbound => event
                .previous()
                .map_or_else(|| event.target().params(), |s| s.params()),
            CallbackPhase::BeforeInbound | CallbackPhase::AfterInbound => {
                event.target().params()
            }
        };

        let mut values = Vec::with_capacity(handler.params.len());
        for spec in &handler.params {
            let raw = params
                .as_string(&spec.name)
                .ok_or_else(|| ConversionError {
                    param: spec.name.clone(),
                    target_type: spec.target_type,
                    reason: ConversionReason::Missing,
                })?;
            let value = (spec.convert)(&raw).map_err(|source| ConversionError {
                param: spec.name.clone(),
                target_type: spec.target_type,
                reason: ConversionReason::Parse(source),
            })?;
            values.push(value);
        }

        (handler.invoke)(view.as_any_mut(), event, &CallbackArgs { values });
        Ok(())
    }
}

impl fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("tables", &self.tables.len())
            .finish()
    }
}
