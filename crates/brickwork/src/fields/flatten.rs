use super::FieldConfig;

/// A field together with the repeater path it lives under.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatField<'a> {
    /// Keys of the enclosing repeaters, outermost first. Empty for fields
    /// stored directly on the brick (or document-fields) table.
    pub repeaters: Vec<&'a str>,
    pub field: &'a FieldConfig,
}

impl FlatField<'_> {
    /// Whether this field is stored in the table for `path`.
    pub fn is_in(&self, path: &[&str]) -> bool {
        self.repeaters.as_slice() == path
    }
}

/// Flatten a field tree into pre-order `(path, field)` pairs.
///
/// Tabs and groups are transparent: their children keep the parent's
/// repeater path. A repeater's children get the repeater's key appended.
/// Container fields themselves are included, so repeaters can be found in
/// the flat list.
pub fn flatten(fields: &[FieldConfig]) -> Vec<FlatField<'_>> {
    let mut out = Vec::new();
    let mut stack: Vec<(Vec<&str>, std::slice::Iter<'_, FieldConfig>)> =
        vec![(Vec::new(), fields.iter())];

    while let Some((path, iter)) = stack.last_mut() {
        let Some(field) = iter.next() else {
            stack.pop();
            continue;
        };
        let path = path.clone();
        out.push(FlatField {
            repeaters: path.clone(),
            field,
        });

        if let Some(children) = field.kind.children() {
            let child_path = if field.kind.is_repeater() {
                let mut p = path;
                p.push(field.key.as_str());
                p
            } else {
                path
            };
            stack.push((child_path, children.iter()));
        }
    }

    out
}
