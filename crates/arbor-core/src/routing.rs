//! Maps locations to the component that should be mounted for them.

use std::fmt;

use indexmap::IndexMap;
use url::Url;

use crate::composer::Composer;
use crate::error::EngineError;

type Factory = Box<dyn Fn() -> Box<dyn Composer>>;

struct Route {
    name: &'static str,
    factory: Factory,
}

#[derive(Default)]
pub struct Routes {
    routes: IndexMap<String, Route>,
}

impl Routes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mounts a fresh `C` whenever the engine navigates to `path`. Registering
    /// the same path twice replaces the earlier factory.
    pub fn route<C: Composer>(
        &mut self,
        path: &str,
        factory: impl Fn() -> C + 'static,
    ) -> &mut Self {
        let route = Route {
            name: std::any::type_name::<C>(),
            factory: Box::new(move || -> Box<dyn Composer> { Box::new(factory()) }),
        };
        self.routes.insert(normalize_path(path), route);
        self
    }

    pub fn contains(&self, path: &str) -> bool {
        self.routes.contains_key(&normalize_path(path))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Resolves `location` against `origin` and returns the routed path.
    ///
    /// Routes are relative to the origin's path, so with an origin of
    /// `https://host/app/` the location `about` routes to `/about`. Parse
    /// failures and locations on another origin are reported before the route
    /// table is consulted.
    pub fn resolve(&self, origin: &Url, location: &str) -> Result<String, EngineError> {
        let url = origin
            .join(location)
            .map_err(|source| EngineError::InvalidLocation {
                input: location.to_owned(),
                source,
            })?;
        if url.origin() != origin.origin() {
            return Err(EngineError::ForeignLocation {
                location: url.into(),
            });
        }
        let base = origin.path().trim_end_matches('/');
        let path = match url.path().strip_prefix(base) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => normalize_path(rest),
            _ => {
                return Err(EngineError::NotFound {
                    path: url.path().to_owned(),
                })
            }
        };
        if self.routes.contains_key(&path) {
            Ok(path)
        } else {
            Err(EngineError::NotFound { path })
        }
    }

    pub(crate) fn build(&self, path: &str) -> Option<(Box<dyn Composer>, &'static str)> {
        self.routes
            .get(path)
            .map(|route| ((route.factory)(), route.name))
    }
}

impl fmt::Debug for Routes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.routes.iter().map(|(path, route)| (path, route.name)))
            .finish()
    }
}

/// Leading slash, no trailing slash, root stays `/`.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    let mut normalized = String::with_capacity(trimmed.len() + 1);
    normalized.push('/');
    normalized.push_str(trimmed);
    normalized
}
