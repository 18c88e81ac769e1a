use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use super::{CustomerRepository, Repository, StoreError};
use crate::model::{Category, Customer, Entity, EntityFilter, EntityId, Order, Product};
use crate::query::{Page, PageRequest, SortDirection};

/// All tables behind one lock so cross-table constraints are checked atomically.
#[derive(Default)]
pub struct Tables {
    categories: BTreeMap<EntityId, Category>,
    products: BTreeMap<EntityId, Product>,
    customers: BTreeMap<EntityId, Customer>,
    orders: BTreeMap<EntityId, Order>,
    sequences: HashMap<&'static str, EntityId>,
}

impl Tables {
    fn next_id(&mut self, kind: &'static str) -> EntityId {
        let seq = self.sequences.entry(kind).or_insert(0);
        *seq += 1;
        *seq
    }

    fn observe_id(&mut self, kind: &'static str, id: EntityId) {
        let seq = self.sequences.entry(kind).or_insert(0);
        if id > *seq {
            *seq = id;
        }
    }
}

/// Table access plus the referential rules a relational schema would enforce.
pub trait MemoryEntity: Entity {
    fn table(tables: &Tables) -> &BTreeMap<EntityId, Self>;
    fn table_mut(tables: &mut Tables) -> &mut BTreeMap<EntityId, Self>;

    fn check_write(&self, _tables: &Tables) -> Result<(), StoreError> {
        Ok(())
    }

    fn check_delete(_id: EntityId, _tables: &Tables) -> Result<(), StoreError> {
        Ok(())
    }
}

impl MemoryEntity for Category {
    fn table(tables: &Tables) -> &BTreeMap<EntityId, Self> {
        &tables.categories
    }
    fn table_mut(tables: &mut Tables) -> &mut BTreeMap<EntityId, Self> {
        &mut tables.categories
    }
    fn check_delete(id: EntityId, tables: &Tables) -> Result<(), StoreError> {
        if tables.products.values().any(|p| p.category_ids.contains(&id)) {
            return Err(StoreError::IntegrityViolation(format!("category {id} is referenced by products")));
        }
        Ok(())
    }
}

impl MemoryEntity for Product {
    fn table(tables: &Tables) -> &BTreeMap<EntityId, Self> {
        &tables.products
    }
    fn table_mut(tables: &mut Tables) -> &mut BTreeMap<EntityId, Self> {
        &mut tables.products
    }
    fn check_write(&self, tables: &Tables) -> Result<(), StoreError> {
        if let Some(missing) = self.category_ids.iter().find(|id| !tables.categories.contains_key(id)) {
            return Err(StoreError::IntegrityViolation(format!("category {missing} does not exist")));
        }
        Ok(())
    }
    fn check_delete(id: EntityId, tables: &Tables) -> Result<(), StoreError> {
        let referenced = tables
            .orders
            .values()
            .any(|o| o.items.iter().any(|item| item.product_id == id));
        if referenced {
            return Err(StoreError::IntegrityViolation(format!("product {id} is referenced by orders")));
        }
        Ok(())
    }
}

impl MemoryEntity for Customer {
    fn table(tables: &Tables) -> &BTreeMap<EntityId, Self> {
        &tables.customers
    }
    fn table_mut(tables: &mut Tables) -> &mut BTreeMap<EntityId, Self> {
        &mut tables.customers
    }
    fn check_write(&self, tables: &Tables) -> Result<(), StoreError> {
        let taken = tables
            .customers
            .values()
            .any(|c| c.id != self.id && c.email.eq_ignore_ascii_case(&self.email));
        if taken {
            return Err(StoreError::IntegrityViolation(format!("email {} already registered", self.email)));
        }
        Ok(())
    }
    fn check_delete(id: EntityId, tables: &Tables) -> Result<(), StoreError> {
        if tables.orders.values().any(|o| o.customer_id == id) {
            return Err(StoreError::IntegrityViolation(format!("customer {id} is referenced by orders")));
        }
        Ok(())
    }
}

impl MemoryEntity for Order {
    fn table(tables: &Tables) -> &BTreeMap<EntityId, Self> {
        &tables.orders
    }
    fn table_mut(tables: &mut Tables) -> &mut BTreeMap<EntityId, Self> {
        &mut tables.orders
    }
    fn check_write(&self, tables: &Tables) -> Result<(), StoreError> {
        if !tables.customers.contains_key(&self.customer_id) {
            return Err(StoreError::IntegrityViolation(format!("customer {} does not exist", self.customer_id)));
        }
        if let Some(item) = self.items.iter().find(|i| !tables.products.contains_key(&i.product_id)) {
            return Err(StoreError::IntegrityViolation(format!("product {} does not exist", item.product_id)));
        }
        Ok(())
    }
}

/// In-process store used by tests and `STORE_BACKEND=memory`.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".into()))
    }
}

#[async_trait]
impl<E: MemoryEntity> Repository<E> for MemoryStore {
    async fn find_by_id(&self, id: EntityId) -> Result<Option<E>, StoreError> {
        let tables = self.read()?;
        Ok(E::table(&tables).get(&id).cloned())
    }

    async fn save(&self, mut entity: E) -> Result<E, StoreError> {
        let mut tables = self.write()?;
        entity.check_write(&tables)?;
        let id = match entity.id() {
            Some(id) => {
                tables.observe_id(E::KIND, id);
                id
            }
            None => tables.next_id(E::KIND),
        };
        entity.set_id(Some(id));
        E::table_mut(&mut tables).insert(id, entity.clone());
        Ok(entity)
    }

    async fn delete_by_id(&self, id: EntityId) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        E::check_delete(id, &tables)?;
        E::table_mut(&mut tables).remove(&id);
        Ok(())
    }

    async fn find_all(&self) -> Result<Vec<E>, StoreError> {
        let tables = self.read()?;
        Ok(E::table(&tables).values().cloned().collect())
    }

    async fn find_all_by_id(&self, ids: &BTreeSet<EntityId>) -> Result<Vec<E>, StoreError> {
        let tables = self.read()?;
        let table = E::table(&tables);
        Ok(ids.iter().filter_map(|id| table.get(id).cloned()).collect())
    }

    async fn find_page(&self, filter: &E::Filter, page: &PageRequest) -> Result<Page<E>, StoreError> {
        let mut rows: Vec<E> = {
            let tables = self.read()?;
            E::table(&tables).values().filter(|e| filter.matches(e)).cloned().collect()
        };
        let field = page.sort_field();
        rows.sort_by(|a, b| {
            let ord = a.compare_by(b, field);
            let ord = match page.direction() {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            };
            ord.then_with(|| a.id().cmp(&b.id()))
        });
        let total = rows.len() as u64;
        let items = rows
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.size() as usize)
            .collect();
        Ok(Page::new(items, total, page))
    }
}

#[async_trait]
impl CustomerRepository for MemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Customer>, StoreError> {
        let tables = self.read()?;
        Ok(tables
            .customers
            .values()
            .find(|c| c.email.eq_ignore_ascii_case(email))
            .cloned())
    }
}
