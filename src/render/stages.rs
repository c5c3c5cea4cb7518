//! Per-stage renderers shared by every aggregate renderer
//!
//! Each function compiles exactly one IR stage into one native stage
//! document. The renderers differ only in which of these they call.

use serde_json::{Map, Value};

use crate::error::QueryResult;
use crate::pipeline::{Accumulator, AdditionalField, Group, Join, Paginate};
use crate::query::{Expr, Field, Sort};

use super::element::to_element_condition;
use super::filter::{doc, to_filter, to_sort};

/// `{ $match: <filter> }`
pub fn match_stage(query: &Expr) -> QueryResult<Value> {
    Ok(doc("$match", to_filter(query)?))
}

/// `{ $sort: { f: 1 | -1, ... } }`
pub fn sort_stage(sort: &Sort) -> Value {
    doc("$sort", to_sort(sort))
}

/// Fan-out with a `data` branch of `[skip, limit]`, plus a
/// `metadata: [{ $count: "total" }]` branch when `with_count` is set
pub fn facet_stage(paginate: &Paginate, with_count: bool) -> Value {
    let mut branches = Map::new();
    if with_count {
        branches.insert(
            "metadata".to_string(),
            Value::Array(vec![doc("$count", Value::from("total"))]),
        );
    }
    branches.insert(
        "data".to_string(),
        Value::Array(vec![
            doc("$skip", Value::from(paginate.skip)),
            doc("$limit", Value::from(paginate.limit)),
        ]),
    );
    doc("$facet", Value::Object(branches))
}

/// Left outer join: `{ $lookup: { from, foreignField, localField, as } }`
pub fn lookup_stage(join: &Join) -> Value {
    let mut lookup = Map::new();
    lookup.insert(
        "from".to_string(),
        Value::from(join.foreign.source().unwrap_or_default()),
    );
    lookup.insert("foreignField".to_string(), Value::from(join.foreign.name.as_str()));
    lookup.insert("localField".to_string(), Value::from(join.local.name.as_str()));
    lookup.insert("as".to_string(), Value::from(join.alias.name.as_str()));
    doc("$lookup", Value::Object(lookup))
}

/// Computed array fields:
/// `{ $addFields: { f: { $filter: { input: { $ifNull: ["$src", []] }, cond } } } }`
///
/// `cond` is compiled in element context, see [`to_element_condition`].
pub fn add_fields_stage(fields: &[AdditionalField]) -> QueryResult<Value> {
    let mut computed = Map::new();
    for additional in fields {
        let input = doc(
            "$ifNull",
            Value::Array(vec![
                Value::String(additional.query_source.path()),
                Value::Array(Vec::new()),
            ]),
        );

        let mut filter = Map::new();
        filter.insert("input".to_string(), input);
        filter.insert("cond".to_string(), to_element_condition(&additional.query)?);

        computed.insert(
            additional.field_to_add.name.clone(),
            doc("$filter", Value::Object(filter)),
        );
    }
    Ok(doc("$addFields", Value::Object(computed)))
}

/// `{ $project: { f: flag, ... } }` with flag 1 (include) or 0 (exclude)
pub fn project_stage(fields: &[Field], include: bool) -> Value {
    let flag = if include { 1 } else { 0 };
    let projection = fields
        .iter()
        .map(|field| (field.name.clone(), Value::from(flag)))
        .collect::<Map<_, _>>();
    doc("$project", Value::Object(projection))
}

/// `{ $group: { _id, <accumulators> } }`
///
/// `_id` is `"$f"` for one key, `{ f: "$f", g: "$g" }` for several and
/// `null` to fold every document into one group.
pub fn group_stage(group: &Group) -> Value {
    let id = match group.group_by.as_slice() {
        [] => Value::Null,
        [single] => Value::String(single.path()),
        several => Value::Object(
            several
                .iter()
                .map(|field| (field.name.clone(), Value::String(field.path())))
                .collect(),
        ),
    };

    let mut grouping = Map::new();
    grouping.insert("_id".to_string(), id);
    for accumulator in &group.accumulators {
        let operator = match accumulator {
            Accumulator::First { field, .. } => doc("$first", Value::String(field.path())),
            Accumulator::Count { .. } => doc("$count", Value::Object(Map::new())),
        };
        grouping.insert(accumulator.output().name.clone(), operator);
    }
    doc("$group", Value::Object(grouping))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{additional_field, count, first, join};
    use crate::query::{and, descending};
    use serde_json::json;

    #[test]
    fn test_facet_branches() {
        let window = Paginate {
            skip: 10,
            limit: 25,
        };
        assert_eq!(
            facet_stage(&window, false),
            json!({ "$facet": { "data": [{ "$skip": 10 }, { "$limit": 25 }] } })
        );
        assert_eq!(
            facet_stage(&window, true),
            json!({ "$facet": {
                "metadata": [{ "$count": "total" }],
                "data": [{ "$skip": 10 }, { "$limit": 25 }]
            } })
        );
    }

    #[test]
    fn test_lookup() {
        let stage = join(&Field::sourced("caseId", "assignments"))
            .onto(&Field::sourced("caseId", "cases"))
            .as_field(&Field::new("allAssignments"));
        let crate::pipeline::Stage::Join(spec) = stage else {
            panic!("expected join");
        };

        assert_eq!(
            lookup_stage(&spec),
            json!({ "$lookup": {
                "from": "assignments",
                "foreignField": "caseId",
                "localField": "caseId",
                "as": "allAssignments"
            } })
        );
    }

    #[test]
    fn test_add_fields() {
        let rendered = add_fields_stage(&[additional_field(
            &Field::new("assignments"),
            &Field::new("allAssignments"),
            Field::new("unassignedOn").not_exists(),
        )])
        .unwrap();

        assert_eq!(
            rendered,
            json!({ "$addFields": { "assignments": { "$filter": {
                "input": { "$ifNull": ["$allAssignments", []] },
                "cond": { "$eq": [{ "$ifNull": ["$$this.unassignedOn", null] }, null] }
            } } } })
        );
    }

    #[test]
    fn test_add_fields_with_empty_query() {
        let rendered = add_fields_stage(&[additional_field(
            &Field::new("matching"),
            &Field::new("all"),
            and(Vec::<Expr>::new()),
        )])
        .unwrap();
        assert_eq!(rendered["$addFields"]["matching"]["$filter"]["cond"], json!({ "$and": [] }));
    }

    #[test]
    fn test_projection_flags() {
        let fields = [Field::new("a"), Field::new("b")];
        assert_eq!(project_stage(&fields, true), json!({ "$project": { "a": 1, "b": 1 } }));
        assert_eq!(project_stage(&fields, false), json!({ "$project": { "a": 0, "b": 0 } }));
    }

    #[test]
    fn test_group_id_shapes() {
        let single = Group {
            group_by: vec![Field::new("caseId")],
            accumulators: vec![
                first(&Field::new("caseTitle"), &Field::new("title")),
                count(&Field::new("total")),
            ],
        };
        assert_eq!(
            group_stage(&single),
            json!({ "$group": {
                "_id": "$caseId",
                "title": { "$first": "$caseTitle" },
                "total": { "$count": {} }
            } })
        );

        let several = Group {
            group_by: vec![Field::new("caseId"), Field::new("role")],
            accumulators: vec![],
        };
        assert_eq!(
            group_stage(&several),
            json!({ "$group": { "_id": { "caseId": "$caseId", "role": "$role" } } })
        );

        let none = Group {
            group_by: vec![],
            accumulators: vec![count(&Field::new("total"))],
        };
        assert_eq!(group_stage(&none)["$group"]["_id"], Value::Null);
    }

    #[test]
    fn test_sort_stage() {
        let sort = crate::query::order_by([descending(&Field::new("dateFiled"))]);
        assert_eq!(sort_stage(&sort), json!({ "$sort": { "dateFiled": -1 } }));
    }
}
