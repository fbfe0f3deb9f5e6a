//! A compound, order-sensitive cache key built up from a sequence of
//! heterogeneous components.
//!
//! This is independent of the connection pool: higher layers use it to
//! fingerprint compound lookup keys (e.g. "statement text + bind
//! parameters") in a way that is exact under hash collisions and sensitive
//! to component order.

use std::any::Any;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

const MULTIPLIER: i32 = 37;
const BASE_HASHCODE: i32 = 17;

/// A component that can be folded into a [`CacheKey`].
///
/// A blanket impl covers any `Hash + Eq + Debug` type, including `Vec<T>`
/// and arrays, whose standard `Hash` impl already hashes elements in order —
/// that's what gives array-valued components an order-sensitive hash for
/// free, without this trait special-casing arrays itself.
pub trait CacheComponent: Send + Sync {
    fn component_hash(&self) -> i32;
    fn component_eq(&self, other: &dyn CacheComponent) -> bool;
    fn as_any(&self) -> &dyn Any;
    fn render(&self) -> String;
}

impl<T> CacheComponent for T
where
    T: Hash + Eq + fmt::Debug + Send + Sync + 'static,
{
    fn component_hash(&self) -> i32 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish() as i32
    }

    fn component_eq(&self, other: &dyn CacheComponent) -> bool {
        other.as_any().downcast_ref::<T>() == Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn render(&self) -> String {
        format!("{:?}", self)
    }
}

impl fmt::Debug for dyn CacheComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// One slot in a [`CacheKey`]'s component sequence: either a real component
/// or an explicit null, which folds in a fixed hash of `1` per the spec.
enum Slot {
    Null,
    Value(Box<dyn CacheComponent>),
}

/// An item accepted by [`CacheKey::update_all`]; lets a heterogeneous,
/// possibly-null sequence be passed in one call.
pub enum CacheItem {
    Null,
    Value(Box<dyn CacheComponent>),
}

impl<T> From<T> for CacheItem
where
    T: CacheComponent + 'static,
{
    fn from(value: T) -> Self {
        CacheItem::Value(Box::new(value))
    }
}

/// An ordered, incrementally-hashed compound key.
///
/// Two keys are equal iff `hashcode`, `checksum`, `count`, and every
/// pairwise component (in order) are equal — any single mismatch
/// short-circuits to unequal, so the design stays exact even under
/// adversarial hash collisions in `hashcode`/`checksum`.
pub struct CacheKey {
    components: Vec<Slot>,
    count: i32,
    checksum: i32,
    hashcode: i32,
    /// Set only by [`CacheKey::null`]; a null key never equals anything,
    /// including another null key or itself compared by value. See
    /// `DESIGN.md` for why this, rather than "equal only to itself", was
    /// chosen to resolve the spec's open question.
    null: bool,
}

impl Default for CacheKey {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheKey {
    pub fn new() -> Self {
        Self {
            components: Vec::new(),
            count: 0,
            checksum: 0,
            hashcode: BASE_HASHCODE,
            null: false,
        }
    }

    /// The singleton null-key sentinel. Equal to nothing, by design.
    pub fn null() -> Self {
        Self {
            components: Vec::new(),
            count: 0,
            checksum: 0,
            hashcode: 0,
            null: true,
        }
    }

    pub fn is_null(&self) -> bool {
        self.null
    }

    pub fn count(&self) -> i32 {
        self.count
    }

    pub fn checksum(&self) -> i32 {
        self.checksum
    }

    pub fn hashcode(&self) -> i32 {
        self.hashcode
    }

    /// Append a component, folding its hash into the running scalars.
    pub fn update<T>(&mut self, component: T)
    where
        T: CacheComponent + 'static,
    {
        self.fold(Slot::Value(Box::new(component)));
    }

    /// Append an explicit null component (`component_hash` of `1`, per spec).
    pub fn update_null(&mut self) {
        self.fold(Slot::Null);
    }

    /// Append every item of `items` in order, equivalent to repeated
    /// [`update`][Self::update]/[`update_null`][Self::update_null] calls.
    pub fn update_all<I>(&mut self, items: I)
    where
        I: IntoIterator<Item = CacheItem>,
    {
        for item in items {
            match item {
                CacheItem::Null => self.update_null(),
                CacheItem::Value(v) => self.fold(Slot::Value(v)),
            }
        }
    }

    fn fold(&mut self, slot: Slot) {
        let base_hash: i32 = match &slot {
            Slot::Null => 1,
            Slot::Value(v) => v.component_hash(),
        };
        self.count = self.count.wrapping_add(1);
        self.checksum = self.checksum.wrapping_add(base_hash);
        self.hashcode = MULTIPLIER
            .wrapping_mul(self.hashcode)
            .wrapping_add(base_hash.wrapping_mul(self.count));
        self.components.push(slot);
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        if self.null || other.null {
            return false;
        }
        if self.hashcode != other.hashcode
            || self.checksum != other.checksum
            || self.count != other.count
            || self.components.len() != other.components.len()
        {
            return false;
        }
        self.components
            .iter()
            .zip(other.components.iter())
            .all(|pair| match pair {
                (Slot::Null, Slot::Null) => true,
                (Slot::Value(a), Slot::Value(b)) => a.component_eq(b.as_ref()),
                _ => false,
            })
    }
}

impl Eq for CacheKey {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Consistent with `Eq`: the null sentinel never collides with a
        // real key's hash bucket even though it carries a fixed hashcode.
        self.null.hash(state);
        self.hashcode.hash(state);
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheKey")
            .field("hashcode", &self.hashcode)
            .field("checksum", &self.checksum)
            .field("count", &self.count)
            .field("null", &self.null)
            .finish()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.hashcode, self.checksum)?;
        for slot in &self.components {
            match slot {
                Slot::Null => write!(f, ":null")?,
                Slot::Value(v) => write!(f, ":{}", v.render())?,
            }
        }
        Ok(())
    }
}
