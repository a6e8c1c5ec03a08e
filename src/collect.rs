use crate::ast::Ast;

/// Parameter names referenced by `ast`, first appearance first.
pub(crate) fn collect_vars(ast: &Ast) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    ast.visit(&mut |node| {
        if let Ast::Var(name) = node {
            if !out.iter().any(|n| n == name) {
                out.push(name.clone());
            }
        }
    });
    out
}

/// Host functions referenced by `ast` as (name, arity), first appearance first.
pub(crate) fn collect_calls(ast: &Ast) -> Vec<(String, u8)> {
    let mut out: Vec<(String, u8)> = Vec::new();
    ast.visit(&mut |node| {
        if let Ast::Call { name, args } = node {
            let arity = args.len().min(u8::MAX as usize) as u8;
            if !out.iter().any(|(n, a)| n == name && *a == arity) {
                out.push((name.clone(), arity));
            }
        }
    });
    out
}
