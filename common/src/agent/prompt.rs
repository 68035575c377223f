/// render the generation prompt: instruction preamble, store context,
/// the literal user request and a closing emit-only-sql directive.
/// pure string composition, identical inputs produce identical output.
pub fn build_query_prompt(db_name: &str, schema: &str, request: &str) -> String {
    format!(
        "You are an expert SQLite SQL generator. Convert natural language to proper SQLite SQL queries.\n\
         \n\
         CONTEXT:\n\
         Database: {}\n\
         Schema: {}\n\
         \n\
         USER QUERY: {}\n\
         \n\
         SQLITE-SPECIFIC GUIDELINES:\n\
         1. Return ONLY the SQL query, no explanations\n\
         2. Always end with semicolon (;)\n\
         3. Use valid SQLite syntax only\n\
         \n\
         Generate SQLite query:",
        db_name, schema, request
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_is_deterministic() {
        let a = build_query_prompt("shop.db", "users (id INTEGER, name TEXT)", "show all users");
        let b = build_query_prompt("shop.db", "users (id INTEGER, name TEXT)", "show all users");
        assert_eq!(a, b);
    }

    #[test]
    fn test_prompt_embeds_inputs_literally() {
        let prompt = build_query_prompt("shop.db", "users (id INTEGER)", "count the users");
        assert!(prompt.contains("Database: shop.db"));
        assert!(prompt.contains("Schema: users (id INTEGER)"));
        assert!(prompt.contains("USER QUERY: count the users"));
    }

    #[test]
    fn test_prompt_names_the_dialect_and_closing_directive() {
        let prompt = build_query_prompt("a.db", "No tables found", "hello");
        assert!(prompt.contains("SQLite"));
        assert!(prompt.ends_with("Generate SQLite query:"));
    }
}
