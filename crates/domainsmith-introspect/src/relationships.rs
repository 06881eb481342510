//! Foreign keys to named associations, with optional table expansion.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use domainsmith_core::{
    AssociationDescriptor, ColumnDescriptor, ConfigTable, ForeignKeyDescriptor, HierarchyConfig,
    JoinConfig, JoinType, Provenance, Result, TableDescriptor, TableRef, humanize, singularize,
};

use crate::introspector::SchemaIntrospector;
use crate::options::ResolveOptions;

/// Column names tried, in order, when a join needs a display column.
pub const DISPLAY_FIELD_PRIORITY: [&str; 4] = ["name", "title", "label", "description"];

/// Associations, joins and expanded tables derived for one root table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AssociationSet {
    pub associations: Vec<AssociationDescriptor>,
    pub joins: Vec<JoinConfig>,
    /// Expanded tables keyed by table name.
    pub schemas: BTreeMap<String, TableDescriptor>,
}

/// Derives associations from a descriptor's foreign keys.
pub struct RelationshipResolver<'a, I: SchemaIntrospector + ?Sized> {
    introspector: &'a I,
    options: &'a ResolveOptions,
}

impl<'a, I: SchemaIntrospector + ?Sized> RelationshipResolver<'a, I> {
    pub fn new(introspector: &'a I, options: &'a ResolveOptions) -> Self {
        Self {
            introspector,
            options,
        }
    }

    pub async fn resolve(&self, descriptor: &TableDescriptor) -> Result<AssociationSet> {
        let associations: Vec<AssociationDescriptor> = derive_associations(descriptor)
            .into_iter()
            .map(|mut assoc| {
                assoc.join_type = self.options.join_type_for(&assoc.name);
                assoc
            })
            .collect();

        let schemas = self.expand(descriptor).await?;

        let mut joins = Vec::with_capacity(associations.len());
        for assoc in &associations {
            let display_field = if assoc.join_type.wants_display_field() {
                let target = association_target(descriptor, assoc);
                Some(self.display_field_for(descriptor, &target, &schemas).await?)
            } else {
                None
            };
            joins.push(join_for(assoc, display_field));
        }

        Ok(AssociationSet {
            associations,
            joins,
            schemas,
        })
    }

    /// Breadth-first expansion of foreign-key targets up to the configured depth.
    ///
    /// A table already present in the expansion is never introspected twice,
    /// which also terminates self references and longer cycles.
    async fn expand(&self, root: &TableDescriptor) -> Result<BTreeMap<String, TableDescriptor>> {
        let mut schemas: BTreeMap<String, TableDescriptor> = BTreeMap::new();
        let depth = self.options.expansion_depth;
        if depth == 0 {
            return Ok(schemas);
        }

        let mut queue: VecDeque<(TableRef, usize)> = fk_targets(root)
            .into_iter()
            .map(|target| (target, depth))
            .collect();

        while let Some((table, remaining)) = queue.pop_front() {
            if schemas.contains_key(&table.table_name) {
                continue;
            }

            let expanded = match self.introspector.introspect(&table).await {
                Ok(expanded) => expanded,
                Err(err) if err.is_missing() => {
                    tracing::warn!(
                        event = "expansion_skipped",
                        root = %root.table_ref(),
                        target = %table,
                        error = %err
                    );
                    continue;
                }
                Err(err) => return Err(err),
            };

            if remaining > 1 {
                for next in fk_targets(&expanded) {
                    if !schemas.contains_key(&next.table_name) && next != table {
                        queue.push_back((next, remaining - 1));
                    }
                }
            }

            tracing::debug!(
                event = "table_expanded",
                root = %root.table_ref(),
                target = %table,
                remaining_depth = remaining - 1
            );
            schemas.insert(table.table_name, expanded);
        }

        Ok(schemas)
    }

    async fn display_field_for(
        &self,
        root: &TableDescriptor,
        target: &TableRef,
        schemas: &BTreeMap<String, TableDescriptor>,
    ) -> Result<String> {
        if let Some(expanded) = schemas
            .get(&target.table_name)
            .filter(|expanded| expanded.schema_name == target.schema_name)
        {
            return Ok(select_display_field(&expanded.columns));
        }
        if *target == root.table_ref() {
            return Ok(select_display_field(&root.columns));
        }

        match self.introspector.introspect(target).await {
            Ok(descriptor) => Ok(select_display_field(&descriptor.columns)),
            Err(err) if err.is_missing() => {
                tracing::warn!(
                    event = "display_field_fallback",
                    target = %target,
                    error = %err
                );
                Ok("id".to_string())
            }
            Err(err) => Err(err),
        }
    }
}

/// Name every foreign key of a descriptor, joining `left`.
///
/// Foreign keys are visited in column order. A composite key contributes one
/// association from its first column pair. When several keys singularize to
/// the same name, each of them is suffixed with its local column; a name that
/// still clashes gets a numeric suffix.
pub fn derive_associations(descriptor: &TableDescriptor) -> Vec<AssociationDescriptor> {
    let mut seen_constraints = BTreeSet::new();
    let mut fks: Vec<&ForeignKeyDescriptor> = descriptor
        .foreign_keys
        .iter()
        .filter(|fk| seen_constraints.insert(fk.constraint_name.as_str()))
        .collect();

    let position = |column: &str| {
        descriptor
            .columns
            .iter()
            .position(|candidate| candidate.name == column)
            .unwrap_or(usize::MAX)
    };
    fks.sort_by(|left, right| {
        position(&left.local_column)
            .cmp(&position(&right.local_column))
            .then_with(|| left.local_column.cmp(&right.local_column))
            .then_with(|| left.constraint_name.cmp(&right.constraint_name))
    });

    let base_names: Vec<String> = fks.iter().map(|fk| singularize(&fk.target_table)).collect();
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for name in &base_names {
        *counts.entry(name.as_str()).or_insert(0) += 1;
    }

    let mut used = BTreeSet::new();
    fks.iter()
        .zip(base_names.iter())
        .map(|(fk, base)| {
            let candidate = if counts.get(base.as_str()).copied().unwrap_or(0) > 1 {
                format!("{base}_{}", fk.local_column)
            } else {
                base.clone()
            };
            let name = unique_name(candidate, &used);
            used.insert(name.clone());

            AssociationDescriptor {
                name,
                target: fk.target_table.clone(),
                owner_key: fk.local_column.clone(),
                related_key: fk.target_column.clone(),
                join_type: JoinType::Left,
                is_custom: false,
                provenance: Provenance::Generated,
                extra: ConfigTable::new(),
            }
        })
        .collect()
}

fn unique_name(candidate: String, used: &BTreeSet<String>) -> String {
    if !used.contains(&candidate) {
        return candidate;
    }
    (2..)
        .map(|suffix| format!("{candidate}_{suffix}"))
        .find(|name| !used.contains(name))
        .unwrap_or(candidate)
}

/// Pick the column that represents a row of the target table.
///
/// Priority: `name`, `title`, `label`, `description`; then the first column
/// not ending in `_id`; then `id`.
pub fn select_display_field(columns: &[ColumnDescriptor]) -> String {
    for preferred in DISPLAY_FIELD_PRIORITY {
        if columns.iter().any(|column| column.name == preferred) {
            return preferred.to_string();
        }
    }
    columns
        .iter()
        .find(|column| !column.name.ends_with("_id"))
        .map(|column| column.name.clone())
        .unwrap_or_else(|| "id".to_string())
}

/// Join presentation for a generated association.
pub fn join_for(assoc: &AssociationDescriptor, display_field: Option<String>) -> JoinConfig {
    let hierarchy = match assoc.join_type {
        JoinType::Hierarchical => Some(HierarchyConfig::adjacency_list()),
        _ => None,
    };
    JoinConfig {
        name: assoc.name.clone(),
        label: humanize(&assoc.name),
        join_type: assoc.join_type,
        display_field,
        hierarchy,
        provenance: Provenance::Generated,
        extra: ConfigTable::new(),
    }
}

fn fk_targets(descriptor: &TableDescriptor) -> Vec<TableRef> {
    let targets: BTreeSet<TableRef> = descriptor
        .foreign_keys
        .iter()
        .map(|fk| descriptor.foreign_key_target(fk))
        .collect();
    targets.into_iter().collect()
}

/// Table behind a derived association, schema included.
fn association_target(descriptor: &TableDescriptor, assoc: &AssociationDescriptor) -> TableRef {
    descriptor
        .foreign_keys
        .iter()
        .find(|fk| fk.local_column == assoc.owner_key && fk.target_table == assoc.target)
        .map(|fk| descriptor.foreign_key_target(fk))
        .unwrap_or_else(|| TableRef::new(&descriptor.schema_name, &assoc.target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use domainsmith_core::CanonicalType;

    fn column(name: &str) -> ColumnDescriptor {
        ColumnDescriptor {
            name: name.to_string(),
            source_type: "text".to_string(),
            canonical_type: CanonicalType::String,
            nullable: true,
            default: None,
            max_length: None,
            enum_values: None,
        }
    }

    fn fk(local: &str, target: &str) -> ForeignKeyDescriptor {
        ForeignKeyDescriptor {
            local_column: local.to_string(),
            target_table: target.to_string(),
            target_column: "id".to_string(),
            constraint_name: format!("messages_{local}_fkey"),
            target_schema: None,
        }
    }

    fn messages(fks: Vec<ForeignKeyDescriptor>) -> TableDescriptor {
        let mut columns = vec![column("id")];
        columns.extend(fks.iter().map(|fk| column(&fk.local_column)));
        TableDescriptor {
            table_name: "messages".to_string(),
            schema_name: "public".to_string(),
            primary_key: vec!["id".to_string()],
            columns,
            foreign_keys: fks,
        }
    }

    #[test]
    fn names_follow_singularized_targets() {
        let descriptor = messages(vec![fk("category_id", "categories"), fk("box_id", "boxes")]);
        let names: Vec<String> = derive_associations(&descriptor)
            .into_iter()
            .map(|assoc| assoc.name)
            .collect();
        assert_eq!(names, vec!["category", "box"]);
    }

    #[test]
    fn colliding_names_are_suffixed_with_local_column() {
        let descriptor = messages(vec![
            fk("sender_id", "users"),
            fk("recipient_id", "users"),
            fk("thread_id", "threads"),
        ]);
        let associations = derive_associations(&descriptor);
        let names: Vec<&str> = associations.iter().map(|assoc| assoc.name.as_str()).collect();
        assert_eq!(names, vec!["user_sender_id", "user_recipient_id", "thread"]);
        assert_eq!(associations[1].owner_key, "recipient_id");
        assert_eq!(associations[1].related_key, "id");
    }

    #[test]
    fn three_way_collisions_stay_unique() {
        let descriptor = messages(vec![
            fk("author_id", "users"),
            fk("editor_id", "users"),
            fk("owner_id", "users"),
        ]);
        let names: BTreeSet<String> = derive_associations(&descriptor)
            .into_iter()
            .map(|assoc| assoc.name)
            .collect();
        assert_eq!(names.len(), 3);
    }

    #[test]
    fn suffixed_name_clashing_with_plain_name_gets_counter() {
        // "user_owner_id" collides with the disambiguated name below.
        let descriptor = messages(vec![
            fk("owner_id", "users"),
            fk("other_id", "users"),
            fk("x_id", "user_owner_ids"),
        ]);
        let names: Vec<String> = derive_associations(&descriptor)
            .into_iter()
            .map(|assoc| assoc.name)
            .collect();
        assert_eq!(names, vec!["user_owner_id", "user_other_id", "user_owner_id_2"]);
    }

    #[test]
    fn composite_key_uses_its_first_column_pair() {
        // Key order is (tenant_id, account_id); alphabetical order is the reverse.
        let mut tenant = fk("tenant_id", "accounts");
        tenant.constraint_name = "messages_account_fkey".to_string();
        tenant.target_column = "tenant_id".to_string();
        let mut account = fk("account_id", "accounts");
        account.constraint_name = "messages_account_fkey".to_string();

        let associations = derive_associations(&messages(vec![tenant, account]).normalize());
        assert_eq!(associations.len(), 1);
        assert_eq!(associations[0].owner_key, "tenant_id");
        assert_eq!(associations[0].related_key, "tenant_id");
    }

    #[test]
    fn display_field_priority() {
        assert_eq!(
            select_display_field(&[column("id"), column("title"), column("name")]),
            "name"
        );
        assert_eq!(
            select_display_field(&[column("id"), column("description"), column("label")]),
            "label"
        );
    }

    #[test]
    fn display_field_falls_back_to_first_non_key_column() {
        assert_eq!(
            select_display_field(&[column("tenant_id"), column("code"), column("slug")]),
            "code"
        );
        assert_eq!(
            select_display_field(&[column("tenant_id"), column("owner_id")]),
            "id"
        );
    }

    #[test]
    fn hierarchical_join_gets_fixed_bounds() {
        let mut assoc = derive_associations(&messages(vec![fk("parent_id", "messages")]))
            .pop()
            .expect("association");
        assoc.join_type = JoinType::Hierarchical;
        let join = join_for(&assoc, None);
        assert_eq!(join.label, "Message");
        assert_eq!(join.hierarchy, Some(HierarchyConfig::adjacency_list()));
    }

    mod resolve {
        use super::*;
        use domainsmith_core::IntrospectionError;

        use crate::introspector::SchemaIntrospector;
        use crate::object::{
            ObjectAssociation, ObjectField, ObjectModel, ObjectSchema, ObjectSchemaIntrospector,
        };

        fn shop() -> ObjectSchemaIntrospector {
            let model = ObjectModel::new()
                .with_schema(
                    "Shop.Order",
                    ObjectSchema::new("orders")
                        .primary_key(["id"])
                        .field(ObjectField::new("id", "integer"))
                        .field(ObjectField::new("total", "numeric"))
                        .field(ObjectField::new("customer_id", "integer"))
                        .association(ObjectAssociation::belongs_to(
                            "customer",
                            "customer_id",
                            "customers",
                        )),
                )
                .with_schema(
                    "Shop.Customer",
                    ObjectSchema::new("customers")
                        .primary_key(["id"])
                        .field(ObjectField::new("id", "integer"))
                        .field(ObjectField::new("region_id", "integer"))
                        .field(ObjectField::new("email", "string"))
                        .association(ObjectAssociation::belongs_to(
                            "region", "region_id", "regions",
                        )),
                )
                .with_schema(
                    "Shop.Region",
                    ObjectSchema::new("regions")
                        .primary_key(["id"])
                        .field(ObjectField::new("id", "integer"))
                        .field(ObjectField::new("title", "string")),
                )
                .with_schema(
                    "Staff.Employee",
                    ObjectSchema::new("employees")
                        .primary_key(["id"])
                        .field(ObjectField::new("id", "integer"))
                        .field(ObjectField::new("name", "string"))
                        .field(ObjectField::new("manager_id", "integer"))
                        .association(ObjectAssociation::belongs_to(
                            "manager",
                            "manager_id",
                            "employees",
                        )),
                )
                .with_schema(
                    "Graph.A",
                    ObjectSchema::new("a_nodes")
                        .primary_key(["id"])
                        .field(ObjectField::new("id", "integer"))
                        .field(ObjectField::new("b_id", "integer"))
                        .association(ObjectAssociation::belongs_to("b", "b_id", "b_nodes")),
                )
                .with_schema(
                    "Graph.B",
                    ObjectSchema::new("b_nodes")
                        .primary_key(["id"])
                        .field(ObjectField::new("id", "integer"))
                        .field(ObjectField::new("a_id", "integer"))
                        .association(ObjectAssociation::belongs_to("a", "a_id", "a_nodes")),
                );
            ObjectSchemaIntrospector::new(model)
        }

        async fn descriptor(introspector: &ObjectSchemaIntrospector, table: &str) -> TableDescriptor {
            introspector
                .introspect(&TableRef::public(table))
                .await
                .expect("descriptor")
        }

        #[tokio::test]
        async fn orders_resolve_to_one_left_association() {
            let introspector = shop();
            let orders = descriptor(&introspector, "orders").await;
            let options = ResolveOptions::default();
            let set = RelationshipResolver::new(&introspector, &options)
                .resolve(&orders)
                .await
                .expect("resolve");

            assert_eq!(set.associations.len(), 1);
            let customer = &set.associations[0];
            assert_eq!(customer.name, "customer");
            assert_eq!(customer.target, "customers");
            assert_eq!(customer.owner_key, "customer_id");
            assert_eq!(customer.related_key, "id");
            assert_eq!(customer.join_type, JoinType::Left);
            assert_eq!(set.joins[0].display_field, None);
            assert!(set.schemas.is_empty());
        }

        #[tokio::test]
        async fn expansion_follows_depth() {
            let introspector = shop();
            let orders = descriptor(&introspector, "orders").await;

            let one = ResolveOptions::with_depth(1);
            let set = RelationshipResolver::new(&introspector, &one)
                .resolve(&orders)
                .await
                .expect("resolve");
            assert_eq!(set.schemas.keys().collect::<Vec<_>>(), vec!["customers"]);

            let two = ResolveOptions::with_depth(2);
            let set = RelationshipResolver::new(&introspector, &two)
                .resolve(&orders)
                .await
                .expect("resolve");
            assert_eq!(
                set.schemas.keys().collect::<Vec<_>>(),
                vec!["customers", "regions"]
            );
        }

        #[tokio::test]
        async fn self_reference_yields_one_schema_entry() {
            let introspector = shop();
            let employees = descriptor(&introspector, "employees").await;
            let options = ResolveOptions::with_depth(5);
            let set = RelationshipResolver::new(&introspector, &options)
                .resolve(&employees)
                .await
                .expect("resolve");

            assert_eq!(set.schemas.len(), 1);
            assert!(set.schemas.contains_key("employees"));
            assert_eq!(set.associations[0].name, "employee");
        }

        #[tokio::test]
        async fn two_table_cycle_terminates() {
            let introspector = shop();
            let a_nodes = descriptor(&introspector, "a_nodes").await;
            let options = ResolveOptions::with_depth(10);
            let set = RelationshipResolver::new(&introspector, &options)
                .resolve(&a_nodes)
                .await
                .expect("resolve");

            assert_eq!(
                set.schemas.keys().collect::<Vec<_>>(),
                vec!["a_nodes", "b_nodes"]
            );
        }

        #[tokio::test]
        async fn missing_target_is_skipped() {
            let introspector = ObjectSchemaIntrospector::new(ObjectModel::new().with_schema(
                "Shop.Order",
                ObjectSchema::new("orders")
                    .primary_key(["id"])
                    .field(ObjectField::new("id", "integer"))
                    .field(ObjectField::new("coupon_id", "integer"))
                    .association(ObjectAssociation::belongs_to("coupon", "coupon_id", "coupons")),
            ));
            let orders = descriptor(&introspector, "orders").await;
            let mut options = ResolveOptions::with_depth(1);
            options
                .join_overrides
                .insert("coupon".to_string(), JoinType::Dimension);

            let set = RelationshipResolver::new(&introspector, &options)
                .resolve(&orders)
                .await
                .expect("resolve");
            assert!(set.schemas.is_empty());
            assert_eq!(set.associations.len(), 1);
            assert_eq!(set.joins[0].display_field.as_deref(), Some("id"));
        }

        #[tokio::test]
        async fn overrides_pick_join_type_and_display_field() {
            let introspector = shop();
            let customers = descriptor(&introspector, "customers").await;
            let mut options = ResolveOptions::default();
            options
                .join_overrides
                .insert("region".to_string(), JoinType::StarDimension);

            let set = RelationshipResolver::new(&introspector, &options)
                .resolve(&customers)
                .await
                .expect("resolve");
            let join = &set.joins[0];
            assert_eq!(join.join_type, JoinType::StarDimension);
            assert_eq!(join.display_field.as_deref(), Some("title"));
            assert_eq!(join.label, "Region");
            assert!(set.schemas.is_empty());
        }

        /// Descriptors looked up by schema and table name.
        struct Catalog(Vec<TableDescriptor>);

        #[async_trait::async_trait]
        impl SchemaIntrospector for Catalog {
            fn source_kind(&self) -> &'static str {
                "catalog"
            }

            async fn introspect(&self, table: &TableRef) -> Result<TableDescriptor> {
                self.0
                    .iter()
                    .find(|descriptor| descriptor.table_ref() == *table)
                    .cloned()
                    .ok_or_else(|| IntrospectionError::TableNotFound {
                        schema: table.schema_name.clone(),
                        table: table.table_name.clone(),
                    })
            }

            async fn list_tables(&self, schema_name: &str) -> Result<Vec<String>> {
                Ok(self
                    .0
                    .iter()
                    .filter(|descriptor| descriptor.schema_name == schema_name)
                    .map(|descriptor| descriptor.table_name.clone())
                    .collect())
            }
        }

        fn table(schema: &str, name: &str, columns: &[&str]) -> TableDescriptor {
            TableDescriptor {
                table_name: name.to_string(),
                schema_name: schema.to_string(),
                primary_key: vec!["id".to_string()],
                columns: columns.iter().map(|name| column(name)).collect(),
                foreign_keys: Vec::new(),
            }
        }

        #[tokio::test]
        async fn cross_schema_targets_are_looked_up_in_their_schema() {
            let mut orders = table("sales", "orders", &["id", "customer_id"]);
            orders.foreign_keys.push(ForeignKeyDescriptor {
                target_schema: Some("public".to_string()),
                ..fk("customer_id", "customers")
            });
            let catalog = Catalog(vec![
                table("sales", "customers", &["id", "code"]),
                table("public", "customers", &["id", "name"]),
            ]);
            let mut options = ResolveOptions::default();
            options
                .join_overrides
                .insert("customer".to_string(), JoinType::Dimension);

            let set = RelationshipResolver::new(&catalog, &options)
                .resolve(&orders)
                .await
                .expect("resolve");
            assert_eq!(set.joins[0].display_field.as_deref(), Some("name"));

            options.expansion_depth = 1;
            let set = RelationshipResolver::new(&catalog, &options)
                .resolve(&orders)
                .await
                .expect("resolve");
            assert_eq!(
                set.schemas.get("customers").map(|expanded| expanded.schema_name.as_str()),
                Some("public")
            );
            assert_eq!(set.joins[0].display_field.as_deref(), Some("name"));
        }

        #[tokio::test]
        async fn hierarchical_override_on_self_reference() {
            let introspector = shop();
            let employees = descriptor(&introspector, "employees").await;
            let mut options = ResolveOptions::default();
            options
                .join_overrides
                .insert("employee".to_string(), JoinType::Hierarchical);

            let set = RelationshipResolver::new(&introspector, &options)
                .resolve(&employees)
                .await
                .expect("resolve");
            assert_eq!(set.joins[0].hierarchy, Some(HierarchyConfig::adjacency_list()));
            assert_eq!(set.joins[0].display_field, None);
        }
    }
}
