//! Record field tables.
//!
//! A record lists its fields once, through [`Record::fields`] (usually
//! generated by [`record!`](crate::record)). The list is flattened into a
//! table of every key the record answers to, with embedded records
//! promoted into their parent:
//!
//! - a field at a shallower embedding depth hides deeper fields of the
//!   same name;
//! - at the same depth a tagged name beats an untagged one;
//! - otherwise same-depth fields of the same name cancel each other out
//!   and neither is reachable.
//!
//! Tables are built on first use and cached for the life of the process.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use tracing::trace;

use crate::decode::Decode;
use crate::encode::Encode;

pub(crate) type GetMut<R> =
    Arc<dyn for<'a> Fn(&'a mut R) -> &'a mut (dyn Decode + 'a) + Send + Sync>;
pub(crate) type Get<R> =
    Arc<dyn for<'a> Fn(&'a R) -> Option<&'a (dyn Encode + 'a)> + Send + Sync>;

type Project<R, E> = Arc<dyn for<'a> Fn(&'a mut R) -> &'a mut E + Send + Sync>;
type View<R, E> = Arc<dyn for<'a> Fn(&'a R) -> Option<&'a E> + Send + Sync>;
type Expand<R> = Box<dyn Fn(&mut Vec<TypeId>) -> Vec<Field<R>>>;

/// A struct bound to and from SC dictionaries field by field.
///
/// Implement it with the [`record!`](crate::record) macro, which also
/// provides the matching [`Decode`] and [`Encode`] implementations.
pub trait Record: Sized + 'static {
    /// Name used in error messages.
    const NAME: &'static str;

    /// Fields in declaration order.
    fn fields() -> Vec<FieldDef<Self>>;
}

/// Declaration of one record field.
pub struct FieldDef<R> {
    name: &'static str,
    tag: Option<&'static str>,
    get_mut: GetMut<R>,
    get: Get<R>,
    embed: Option<Expand<R>>,
}

impl<R: Record> FieldDef<R> {
    /// An ordinary field, bound under its own name.
    pub fn new<T>(name: &'static str, get_mut: fn(&mut R) -> &mut T, get: fn(&R) -> &T) -> Self
    where
        T: Decode + Encode + 'static,
    {
        FieldDef {
            name,
            tag: None,
            get_mut: pin_mut(move |r| get_mut(r) as &mut dyn Decode),
            get: pin(move |r| Some(get(r) as &dyn Encode)),
            embed: None,
        }
    }

    /// An embedded record whose fields are promoted into this one.
    pub fn embed<E>(name: &'static str, get_mut: fn(&mut R) -> &mut E, get: fn(&R) -> &E) -> Self
    where
        E: Record + Decode + Encode,
    {
        let project = pin_project(move |r| get_mut(r));
        let view = pin_view(move |r| Some(get(r)));
        FieldDef {
            embed: Some(expand(project, view)),
            ..Self::new(name, get_mut, get)
        }
    }

    /// An optional embedded record. It is allocated the first time one of
    /// its fields is decoded, and contributes nothing to the encoding
    /// while absent.
    pub fn embed_opt<E>(
        name: &'static str,
        get_mut: fn(&mut R) -> &mut Option<Box<E>>,
        get: fn(&R) -> &Option<Box<E>>,
    ) -> Self
    where
        E: Record + Decode + Encode + Default,
    {
        let project = pin_project(move |r| &mut **get_mut(r).get_or_insert_with(Box::default));
        let view = pin_view(move |r| get(r).as_deref());
        FieldDef {
            embed: Some(expand(project, view)),
            ..Self::new(name, get_mut, get)
        }
    }

    /// Set the field's tag: `"name"`, `"-"`, `"name,omitempty"` or
    /// `",omitempty"`. A named tag turns an embedded record into an
    /// ordinary field.
    pub fn tag(mut self, tag: &'static str) -> Self {
        self.tag = Some(tag);
        self
    }
}

fn pin_mut<R, F>(f: F) -> GetMut<R>
where
    F: for<'a> Fn(&'a mut R) -> &'a mut (dyn Decode + 'a) + Send + Sync + 'static,
{
    Arc::new(f)
}

fn pin<R, F>(f: F) -> Get<R>
where
    F: for<'a> Fn(&'a R) -> Option<&'a (dyn Encode + 'a)> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn pin_project<R, E, F>(f: F) -> Project<R, E>
where
    F: for<'a> Fn(&'a mut R) -> &'a mut E + Send + Sync + 'static,
{
    Arc::new(f)
}

fn pin_view<R, E, F>(f: F) -> View<R, E>
where
    F: for<'a> Fn(&'a R) -> Option<&'a E> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn expand<R: Record, E: Record>(project: Project<R, E>, view: View<R, E>) -> Expand<R> {
    Box::new(move |ancestors| {
        // An optional embedding can refer back to an enclosing record.
        if ancestors.contains(&TypeId::of::<E>()) {
            return Vec::new();
        }
        candidates::<E>(ancestors)
            .into_iter()
            .map(|f| f.lift(&project, &view))
            .collect()
    })
}

/// A flattened field: the key it answers to and accessors reaching it
/// from the outermost record.
pub(crate) struct Field<R> {
    pub(crate) name: &'static str,
    folded: String,
    tagged: bool,
    pub(crate) omit_empty: bool,
    /// Declaration position at each embedding level.
    index: Vec<usize>,
    pub(crate) get_mut: GetMut<R>,
    pub(crate) get: Get<R>,
}

impl<E: 'static> Field<E> {
    fn lift<R: 'static>(self, project: &Project<R, E>, view: &View<R, E>) -> Field<R> {
        let (inner_mut, inner) = (self.get_mut, self.get);
        let (project, view) = (Arc::clone(project), Arc::clone(view));
        Field {
            name: self.name,
            folded: self.folded,
            tagged: self.tagged,
            omit_empty: self.omit_empty,
            index: self.index,
            get_mut: pin_mut(move |r| inner_mut(project(r))),
            get: pin(move |r| view(r).and_then(|e| inner(e))),
        }
    }
}

/// Split a tag into its name and whether `omitempty` is set. `None` for
/// fields tagged `-`.
fn parse_tag(tag: Option<&'static str>) -> Option<(Option<&'static str>, bool)> {
    let Some(tag) = tag else {
        return Some((None, false));
    };
    if tag == "-" {
        return None;
    }
    let (name, options) = tag.split_once(',').unwrap_or((tag, ""));
    let omit_empty = options.split(',').any(|o| o == "omitempty");
    Some(((!name.is_empty()).then_some(name), omit_empty))
}

/// Every field reachable from `R`, before conflicts are resolved.
fn candidates<R: Record>(ancestors: &mut Vec<TypeId>) -> Vec<Field<R>> {
    ancestors.push(TypeId::of::<R>());
    let mut out = Vec::new();
    for (i, def) in R::fields().into_iter().enumerate() {
        let Some((rename, omit_empty)) = parse_tag(def.tag) else {
            continue;
        };
        match def.embed {
            Some(expand) if rename.is_none() => {
                out.extend(expand(ancestors).into_iter().map(|mut f| {
                    f.index.insert(0, i);
                    f
                }));
            }
            _ => {
                let name = rename.unwrap_or(def.name);
                out.push(Field {
                    name,
                    folded: name.to_lowercase(),
                    tagged: rename.is_some(),
                    omit_empty,
                    index: vec![i],
                    get_mut: def.get_mut,
                    get: def.get,
                });
            }
        }
    }
    ancestors.pop();
    out
}

/// The flattened field table of a record.
pub(crate) struct Fields<R> {
    list: Vec<Field<R>>,
    exact: HashMap<&'static str, usize>,
}

impl<R: Record> Fields<R> {
    fn build() -> Self {
        let mut all = candidates::<R>(&mut Vec::new());
        all.sort_by(|a, b| {
            a.name
                .cmp(b.name)
                .then(a.index.len().cmp(&b.index.len()))
                .then(b.tagged.cmp(&a.tagged))
                .then(a.index.cmp(&b.index))
        });

        let mut list = Vec::with_capacity(all.len());
        let mut all = all.into_iter().peekable();
        while let Some(first) = all.next() {
            let second = all.next_if(|f| f.name == first.name);
            while all.next_if(|f| f.name == first.name).is_some() {}
            match second {
                Some(second)
                    if second.index.len() == first.index.len() && second.tagged == first.tagged => {}
                _ => list.push(first),
            }
        }
        list.sort_by(|a, b| a.index.cmp(&b.index));

        let exact = list.iter().enumerate().map(|(i, f)| (f.name, i)).collect();
        Fields { list, exact }
    }
}

impl<R> Fields<R> {
    pub(crate) fn iter(&self) -> std::slice::Iter<'_, Field<R>> {
        self.list.iter()
    }

    /// The field for `key`: an exact match, else the first field whose
    /// name matches ignoring case.
    pub(crate) fn find(&self, key: &str) -> Option<&Field<R>> {
        self.exact
            .get(key)
            .and_then(|&i| self.list.get(i))
            .or_else(|| {
                let folded = key.to_lowercase();
                self.list.iter().find(|f| f.folded == folded)
            })
    }
}

type Cache = RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>;

/// The cached field table of `R`, built on first use.
pub(crate) fn cached<R: Record>() -> Arc<Fields<R>> {
    static CACHE: OnceLock<Cache> = OnceLock::new();
    let cache = CACHE.get_or_init(Cache::default);
    let id = TypeId::of::<R>();

    let hit = cache
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&id)
        .cloned();
    if let Some(fields) = hit.and_then(|entry| entry.downcast::<Fields<R>>().ok()) {
        return fields;
    }

    let fields = Arc::new(Fields::<R>::build());
    trace!(record = R::NAME, fields = fields.list.len(), "built field table");
    let entry = cache
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .entry(id)
        .or_insert_with(|| fields.clone() as Arc<dyn Any + Send + Sync>)
        .clone();
    entry.downcast::<Fields<R>>().unwrap_or(fields)
}

/// Implement [`Record`], [`Decode`] and [`Encode`] for a struct.
///
/// Each field is listed by name, optionally followed by a tag:
///
/// - `field` is bound under the key `field`;
/// - `field => "key"` renames it;
/// - `field => "-"` leaves it out;
/// - `field => "key,omitempty"` or `field => ",omitempty"` leaves it out of
///   the encoding when it holds an empty value;
/// - `#[embed] field` promotes the fields of an embedded record;
/// - `#[embed_opt] field` does the same for an `Option<Box<_>>`.
///
/// # Example
///
/// ```
/// use libsc::{record, unmarshal};
///
/// #[derive(Debug, Default)]
/// struct Config {
///     name: String,
///     memory: i64,
///     internal: bool,
/// }
///
/// record!(Config {
///     name,
///     memory => "mem",
///     internal => "-",
/// });
///
/// let mut config = Config::default();
/// unmarshal("{ name: \"foo\", mem: 256 }", &mut config).unwrap();
/// assert_eq!(config.name, "foo");
/// assert_eq!(config.memory, 256);
/// ```
#[macro_export]
macro_rules! record {
    ($ty:ident { $($body:tt)* }) => {
        impl $crate::Record for $ty {
            const NAME: &'static str = stringify!($ty);

            fn fields() -> ::std::vec::Vec<$crate::FieldDef<Self>> {
                #[allow(unused_mut)]
                let mut fields = ::std::vec::Vec::new();
                $crate::record!(@fields fields; $($body)*);
                fields
            }
        }

        impl $crate::Decode for $ty {
            fn decode_dict(
                &mut self,
                dict: &$crate::DictionaryNode,
                d: &mut $crate::Decoder<'_>,
            ) -> ::std::result::Result<(), $crate::DecodeError> {
                $crate::decode_record(self, dict, d)
            }
        }

        impl $crate::Encode for $ty {
            fn encode(&self) -> ::std::result::Result<$crate::Node, $crate::EncodeError> {
                $crate::encode_record(self)
            }
        }
    };

    (@fields $v:ident;) => {};
    (@fields $v:ident; #[embed] $f:ident => $tag:literal $(, $($rest:tt)*)?) => {
        $v.push(
            $crate::FieldDef::embed(stringify!($f), |r: &mut Self| &mut r.$f, |r: &Self| &r.$f)
                .tag($tag),
        );
        $crate::record!(@fields $v; $($($rest)*)?);
    };
    (@fields $v:ident; #[embed] $f:ident $(, $($rest:tt)*)?) => {
        $v.push($crate::FieldDef::embed(
            stringify!($f),
            |r: &mut Self| &mut r.$f,
            |r: &Self| &r.$f,
        ));
        $crate::record!(@fields $v; $($($rest)*)?);
    };
    (@fields $v:ident; #[embed_opt] $f:ident => $tag:literal $(, $($rest:tt)*)?) => {
        $v.push(
            $crate::FieldDef::embed_opt(stringify!($f), |r: &mut Self| &mut r.$f, |r: &Self| &r.$f)
                .tag($tag),
        );
        $crate::record!(@fields $v; $($($rest)*)?);
    };
    (@fields $v:ident; #[embed_opt] $f:ident $(, $($rest:tt)*)?) => {
        $v.push($crate::FieldDef::embed_opt(
            stringify!($f),
            |r: &mut Self| &mut r.$f,
            |r: &Self| &r.$f,
        ));
        $crate::record!(@fields $v; $($($rest)*)?);
    };
    (@fields $v:ident; $f:ident => $tag:literal $(, $($rest:tt)*)?) => {
        $v.push(
            $crate::FieldDef::new(stringify!($f), |r: &mut Self| &mut r.$f, |r: &Self| &r.$f)
                .tag($tag),
        );
        $crate::record!(@fields $v; $($($rest)*)?);
    };
    (@fields $v:ident; $f:ident $(, $($rest:tt)*)?) => {
        $v.push($crate::FieldDef::new(
            stringify!($f),
            |r: &mut Self| &mut r.$f,
            |r: &Self| &r.$f,
        ));
        $crate::record!(@fields $v; $($($rest)*)?);
    };
}
