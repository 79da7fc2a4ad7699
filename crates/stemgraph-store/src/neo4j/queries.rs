//! Cypher statements sent to the transaction endpoint.
//!
//! Node rows are always `[id, node, labels]` and edge rows `[from, type, to, ..]`
//! so that `decode` can read every result the same way.

pub const ALL_NODES: &str = "MATCH (n) \
     RETURN id(n) AS id, n AS node, labels(n) AS labels \
     ORDER BY id";

pub const ALL_EDGES: &str = "MATCH (s)-[r]->(t) \
     RETURN id(s) AS from, type(r) AS type, id(t) AS to, r AS rel \
     ORDER BY from, to";

pub const FIND_NODES: &str = "MATCH (n) \
     WHERE toString(id(n)) = $identifier OR n.uuid = $identifier OR n.name = $identifier \
     WITH n, CASE \
         WHEN toString(id(n)) = $identifier THEN 0 \
         WHEN n.uuid = $identifier THEN 1 \
         ELSE 2 END AS rank \
     RETURN id(n) AS id, n AS node, labels(n) AS labels \
     ORDER BY rank, id \
     LIMIT 25";

// Uuids are unique across labels, so merges match on the uuid alone and add
// the label afterwards.
pub const UPSERT_NODE: &str = "MERGE (n {uuid: $uuid}) \
     SET n:Challenge, n.name = $name, n.repo_domain = $repo_domain, n.description = $description \
     REMOVE n.placeholder \
     RETURN id(n) AS id";

pub const NODE_EXISTS: &str = "MATCH (n {uuid: $uuid}) RETURN id(n) AS id LIMIT 1";

pub const LINK_BUILDS_ON: &str = "MATCH (n {uuid: $uuid}) \
     UNWIND $builds_on AS dep \
     MERGE (m {uuid: dep}) \
     ON CREATE SET m:Challenge, m.placeholder = true \
     MERGE (n)-[:BUILDS_ON]->(m) \
     RETURN count(m) AS linked";

pub const SUBGRAPH_NODES: &str = "MATCH (root {uuid: $uuid})-[:BUILDS_ON*0..]->(n) \
     RETURN DISTINCT id(n) AS id, n AS node, labels(n) AS labels";

pub const SUBGRAPH_EDGES: &str = "MATCH (root {uuid: $uuid})-[:BUILDS_ON*0..]->(s)-[r:BUILDS_ON]->(t) \
     RETURN DISTINCT id(s) AS from, type(r) AS type, id(t) AS to";

pub const PING: &str = "RETURN 1 AS ok";

pub const UUID_CONSTRAINT: &str = "CREATE CONSTRAINT challenge_uuid IF NOT EXISTS \
     FOR (n:Challenge) REQUIRE n.uuid IS UNIQUE";
