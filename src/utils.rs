//! Small tree-walking helpers shared by the CalDAV backend's XML handling

use minidom::Element;

/// Walk an XML tree and return every element with the given (local) name
pub fn find_elems<'a, S: AsRef<str>>(root: &'a Element, searched_name: S) -> Vec<&'a Element> {
    let searched_name = searched_name.as_ref();
    let mut elems: Vec<&Element> = Vec::new();

    for el in root.children() {
        if el.name() == searched_name {
            elems.push(el);
        } else {
            elems.extend(find_elems(el, searched_name));
        }
    }
    elems
}

/// Walk an XML tree until an element with the given (local) name is found
pub fn find_elem<'a, S: AsRef<str>>(root: &'a Element, searched_name: S) -> Option<&'a Element> {
    let searched_name = searched_name.as_ref();
    if root.name() == searched_name {
        return Some(root);
    }
    for el in root.children() {
        if let Some(found) = find_elem(el, searched_name) {
            return Some(found);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_nested_element() {
        let root: Element = "<a xmlns=\"ns\"><b><c>x</c></b></a>".parse().unwrap();
        assert!(find_elem(&root, "c").is_some());
        assert!(find_elem(&root, "missing").is_none());
    }

    #[test]
    fn finds_all_matching_elements() {
        let root: Element = "<a xmlns=\"ns\"><b>1</b><c><b>2</b></c></a>".parse().unwrap();
        assert_eq!(find_elems(&root, "b").len(), 2);
    }
}
