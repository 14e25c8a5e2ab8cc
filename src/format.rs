use crate::concrete::{DefId, SourceId};
use crate::error::{CycleError, CycleKind};
use crate::listener::ConcreteProvider;
use crate::sources::FileSources;
use codespan_reporting::diagnostic::{Diagnostic, Label};
use codespan_reporting::term;
use codespan_reporting::term::WriteStyle;

fn display_name(concrete: &dyn ConcreteProvider, id: DefId) -> String {
    concrete
        .get_concrete(id)
        .map(|def| def.name.clone())
        .unwrap_or_else(|| format!("<def:{}>", id.0))
}

pub fn cycle_diagnostic(
    files: &FileSources,
    error: &CycleError,
    concrete: &dyn ConcreteProvider,
) -> Diagnostic<SourceId> {
    let names: Vec<String> = error
        .members
        .iter()
        .map(|id| format!("`{}`", display_name(concrete, *id)))
        .collect();

    let mut labels = Vec::new();
    for (index, id) in error.members.iter().enumerate() {
        let Some(def) = concrete.get_concrete(*id) else {
            continue;
        };
        // Generated definitions have nothing to point at.
        if !files.contains(def.span.source) {
            continue;
        }
        let label = if index == 0 {
            Label::primary(def.span.source, def.span.range())
                .with_message("this definition depends on itself")
        } else {
            Label::secondary(def.span.source, def.span.range()).with_message("through this one")
        };
        labels.push(label);
    }

    let note = match error.kind {
        CycleKind::Definitions => {
            "recursive definitions are checked together only if their signatures do not depend on each other"
        }
        CycleKind::Instances => {
            "instance search may use any of these instances while checking another"
        }
    };

    Diagnostic::error()
        .with_message(format!("{} cycle between {}", error.kind, names.join(", ")))
        .with_labels(labels)
        .with_notes(vec![note.to_string()])
}

pub fn report_cycle_errors(
    writer: &mut impl WriteStyle,
    files: &FileSources,
    errors: &[CycleError],
    concrete: &dyn ConcreteProvider,
) -> Result<(), codespan_reporting::files::Error> {
    let config = term::Config::default();

    for error in errors {
        let diagnostic = cycle_diagnostic(files, error, concrete);
        term::emit_to_write_style(writer, &config, files, &diagnostic)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concrete::{DefinitionKind, FunctionKind, Span};
    use crate::table::DefinitionTable;
    use codespan_reporting::term::termcolor::NoColor;

    fn render(files: &FileSources, errors: &[CycleError], table: &DefinitionTable) -> String {
        let mut writer = NoColor::new(Vec::new());
        report_cycle_errors(&mut writer, files, errors, table).unwrap();
        String::from_utf8(writer.into_inner()).unwrap()
    }

    #[test]
    fn test_cycle_report() {
        let source = "\\func f : g => 0\n\\func g : f => 0\n";
        let file = SourceId(1);
        let mut files = FileSources::new();
        files.add(file, "Main.ard", source);

        let mut table = DefinitionTable::new();
        let main = table.add_module("Main");
        let kind = || DefinitionKind::Function {
            kind: FunctionKind::Func,
            use_parent: None,
        };
        let f = table.declare(main, "f", kind(), Span::new(file, 6..7));
        let g = table.declare(main, "g", kind(), Span::new(file, 23..24));

        let output = render(&files, &[CycleError::new(&[f, g], false)], &table);
        assert!(output.contains("error: definition cycle between `f`, `g`"));
        assert!(output.contains("Main.ard:1:7"));
        assert!(output.contains("this definition depends on itself"));
        assert!(output.contains("through this one"));
    }

    #[test]
    fn test_generated_definitions_have_no_labels() {
        let files = FileSources::new();
        let mut table = DefinitionTable::new();
        let main = table.add_module("Main");
        let i = table.declare(
            main,
            "i",
            DefinitionKind::Function {
                kind: FunctionKind::Instance,
                use_parent: None,
            },
            Span::synthetic(),
        );

        let error = CycleError::new(&[i, DefId(7)], true);
        let diagnostic = cycle_diagnostic(&files, &error, &table);
        assert!(diagnostic.labels.is_empty());
        assert_eq!(diagnostic.message, "instance cycle between `i`, `<def:7>`");

        let output = render(&files, &[error], &table);
        assert!(output.contains("instance search may use any of these instances"));
    }
}
