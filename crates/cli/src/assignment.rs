use cascade_resolver::FieldName;

/// `FIELD=VALUE` pair given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub field: FieldName,
    pub value: String,
}

pub fn parse_assignment(raw: &str) -> Result<Assignment, String> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=VALUE, got {raw:?}"))?;
    let field = field.parse::<FieldName>().map_err(|e| e.to_string())?;
    Ok(Assignment {
        field,
        value: value.to_string(),
    })
}
