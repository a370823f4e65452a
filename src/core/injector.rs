// src/core/injector.rs

//! # Function-Default Injector
//!
//! Binds a function's parameter defaults to a [`ConfigStore`], independently of any CLI.
//! Parameters are described by a [`Signature`]; [`wrap_config`] seeds their defaults into
//! the store once, and every [`ConfiguredFn::call`] recomputes the effective values from
//! the live store.

use crate::core::store::{ConfigStore, StoreError};
use crate::models::Namespace;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

/// A store shared between a parser, wrapped functions and the caller.
pub type SharedStore = Rc<RefCell<ConfigStore>>;

/// Errors raised while wrapping or calling a configured function.
#[derive(Error, Debug)]
pub enum InjectError {
    /// More positional arguments than parameters.
    #[error("{}", too_many_args_message(.name, .expected, .given))]
    TooManyArguments {
        /// Function name.
        name: String,
        /// Number of parameters.
        expected: usize,
        /// Number of positional arguments passed.
        given: usize,
    },
    /// A parameter without a default got no value from any source.
    #[error("{}", missing_arg_message(.name, .param))]
    MissingArgument {
        /// Function name.
        name: String,
        /// The parameter left without a value.
        param: String,
    },
    /// A keyword argument names no parameter.
    #[error("{}", unexpected_arg_message(.name, .param))]
    UnexpectedArgument {
        /// Function name.
        name: String,
        /// The unknown keyword.
        param: String,
    },
    /// [`Signature::of`] was given a type that does not serialize to a mapping.
    #[error("{}", t!("inject.error.not_a_mapping"))]
    NotAMapping,
    /// Converting to or from a [`Value`] failed.
    #[error(transparent)]
    Serialize(#[from] serde_json::Error),
    /// Seeding the store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

fn too_many_args_message(name: &str, expected: &usize, given: &usize) -> String {
    format!(
        t!("inject.error.too_many_args"),
        name = name,
        expected = expected,
        given = given
    )
}

fn missing_arg_message(name: &str, param: &str) -> String {
    format!(t!("inject.error.missing_arg"), name = name, param = param)
}

fn unexpected_arg_message(name: &str, param: &str) -> String {
    format!(t!("inject.error.unexpected_arg"), name = name, param = param)
}

/// One parameter: its name and, if it has one, its default.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    /// Parameter name, also its key in the store.
    pub name: String,
    /// Declared default, if any.
    pub default: Option<Value>,
}

/// The ordered parameter list of a wrapped function.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signature {
    name: String,
    params: Vec<Param>,
}

impl Signature {
    /// An empty signature for the function `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
        }
    }

    /// Appends a parameter without a default.
    pub fn param(mut self, name: impl Into<String>) -> Self {
        self.params.push(Param {
            name: name.into(),
            default: None,
        });
        self
    }

    /// Appends a parameter with a default.
    pub fn param_with_default(mut self, name: impl Into<String>, default: Value) -> Self {
        self.params.push(Param {
            name: name.into(),
            default: Some(default),
        });
        self
    }

    /// Derives a signature from the fields of `T`, in declaration order, with
    /// `T::default()` supplying every default.
    pub fn of<T: Serialize + Default>(name: impl Into<String>) -> Result<Self, InjectError> {
        let Value::Object(fields) = serde_json::to_value(T::default())? else {
            return Err(InjectError::NotAMapping);
        };
        Ok(fields
            .into_iter()
            .fold(Self::new(name), |signature, (field, default)| {
                signature.param_with_default(field, default)
            }))
    }

    /// The function name used in error messages.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameters in declaration order.
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    fn has_param(&self, name: &str) -> bool {
        self.params.iter().any(|param| param.name == name)
    }
}

/// A function whose parameter values are completed from a store on each call.
pub struct ConfiguredFn<F> {
    store: SharedStore,
    signature: Signature,
    function: F,
}

impl<F> fmt::Debug for ConfiguredFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfiguredFn")
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// Wraps `function`. Parameter defaults the store does not hold yet, and that its format
/// can write, are inserted and saved once.
pub fn wrap_config<F, R>(
    store: SharedStore,
    signature: Signature,
    function: F,
) -> Result<ConfiguredFn<F>, InjectError>
where
    F: Fn(&Namespace) -> R,
{
    {
        let mut config = store.borrow_mut();
        let missing: Map<String, Value> = signature
            .params
            .iter()
            .filter_map(|param| Some((param, param.default.as_ref()?)))
            .filter(|(param, default)| {
                !config.contains_key(&param.name) && config.try_serialize(default)
            })
            .map(|(param, default)| (param.name.clone(), default.clone()))
            .collect();
        let seeded = config.seed(missing)?;
        if seeded > 0 {
            log::debug!(
                "Seeded {} defaults of {}() into the config",
                seeded,
                signature.name
            );
        }
    }

    Ok(ConfiguredFn {
        store,
        signature,
        function,
    })
}

impl<F, R> ConfiguredFn<F>
where
    F: Fn(&Namespace) -> R,
{
    /// Resolves every parameter and calls the function with the result.
    pub fn call(&self, args: &[Value], kwargs: &Map<String, Value>) -> Result<R, InjectError> {
        let namespace = self.resolve(args, kwargs)?;
        Ok((self.function)(&namespace))
    }

    /// Declared defaults, overridden by stored values, overridden by `kwargs`; then
    /// `args` fill parameters in declaration order.
    pub fn resolve(
        &self,
        args: &[Value],
        kwargs: &Map<String, Value>,
    ) -> Result<Namespace, InjectError> {
        let name = &self.signature.name;
        if args.len() > self.signature.params.len() {
            return Err(InjectError::TooManyArguments {
                name: name.clone(),
                expected: self.signature.params.len(),
                given: args.len(),
            });
        }
        if let Some(unknown) = kwargs.keys().find(|key| !self.signature.has_param(key)) {
            return Err(InjectError::UnexpectedArgument {
                name: name.clone(),
                param: unknown.clone(),
            });
        }

        let store = self.store.borrow();
        let mut namespace = Namespace::new();
        for (index, param) in self.signature.params.iter().enumerate() {
            let value = args
                .get(index)
                .or_else(|| kwargs.get(&param.name))
                .or_else(|| store.get(&param.name))
                .or(param.default.as_ref())
                .ok_or_else(|| InjectError::MissingArgument {
                    name: name.clone(),
                    param: param.name.clone(),
                })?;
            namespace.insert(param.name.clone(), value.clone());
        }
        Ok(namespace)
    }

    /// [`resolve`](Self::resolve), deserialized into `T`.
    pub fn resolve_as<T: DeserializeOwned>(
        &self,
        args: &[Value],
        kwargs: &Map<String, Value>,
    ) -> Result<T, InjectError> {
        Ok(self.resolve(args, kwargs)?.deserialize()?)
    }

    /// The wrapped function's signature.
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// The store defaults are read from.
    pub fn store(&self) -> &SharedStore {
        &self.store
    }
}
