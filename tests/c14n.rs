//! Canonical XML tests against the worked examples of the W3C
//! recommendations (Canonical XML 1.0 section 3, Exclusive XML
//! Canonicalization section 2.2), plus document subsets.

#![allow(clippy::unwrap_used)]

use pretty_assertions::assert_eq;
use xmlcore::serial::c14n::{
    canonicalize, canonicalize_node, canonicalize_subset, Algorithm, C14nOptions, Canonicalizer,
};
use xmlcore::{Document, NodeId, NodeRef, NodeSet};

fn c14n(input: &str, algorithm: Algorithm) -> String {
    let doc = Document::parse_str(input).unwrap_or_else(|e| panic!("parse failed: {e}"));
    canonicalize(&doc, &C14nOptions::default().algorithm(algorithm))
}

fn find(doc: &Document, name: &str) -> NodeId {
    doc.descendants(doc.root())
        .find(|&id| doc.is_element(id) && doc.local_name(id) == Some(name))
        .unwrap_or_else(|| panic!("no element {name}"))
}

// ---------------------------------------------------------------------------
// Canonical XML 1.0, section 3
// ---------------------------------------------------------------------------

const PIS_AND_COMMENTS: &str = r#"<?xml version="1.0"?>

<?xml-stylesheet   href="doc.xsl"
   type="text/xsl"   ?>

<!DOCTYPE doc SYSTEM "doc.dtd">

<doc>Hello, world!<!-- Comment 1 --></doc>

<?pi-without-data     ?>

<!-- Comment 2 -->

<!-- Comment 3 -->"#;

#[test]
fn test_pis_and_comments_outside_document_element() {
    let expected = "<?xml-stylesheet href=\"doc.xsl\"\n   type=\"text/xsl\"   ?>\n\
                    <doc>Hello, world!</doc>\n\
                    <?pi-without-data?>";
    assert_eq!(c14n(PIS_AND_COMMENTS, Algorithm::Canonical), expected);
}

#[test]
fn test_pis_and_comments_with_comments() {
    let expected = "<?xml-stylesheet href=\"doc.xsl\"\n   type=\"text/xsl\"   ?>\n\
                    <doc>Hello, world!<!-- Comment 1 --></doc>\n\
                    <?pi-without-data?>\n\
                    <!-- Comment 2 -->\n\
                    <!-- Comment 3 -->";
    assert_eq!(c14n(PIS_AND_COMMENTS, Algorithm::CanonicalWithComments), expected);
}

#[test]
fn test_whitespace_in_document_content_is_kept() {
    let input = "<doc>
   <clean>   </clean>
   <dirty>   A   B   </dirty>
   <mixed>
      A
      <clean>   </clean>
      B
      <dirty>   A   B   </dirty>
      C
   </mixed>
</doc>";
    assert_eq!(c14n(input, Algorithm::Canonical), input);
}

#[test]
fn test_start_and_end_tags() {
    let input = r#"<!DOCTYPE doc [<!ATTLIST e9 attr CDATA "default">]>
<doc>
   <e1   />
   <e2   ></e2>
   <e3   name = "elem3"   id="elem3"   />
   <e4   name="elem4"   id="elem4"   ></e4>
   <e5 a:attr="out" b:attr="sorted" attr2="all" attr="I'm"
      xmlns:b="http://www.ietf.org"
      xmlns:a="http://www.w3.org"
      xmlns="http://example.org"/>
   <e6 xmlns="" xmlns:a="http://www.w3.org">
      <e7 xmlns="http://www.ietf.org">
         <e8 xmlns="" xmlns:a="http://www.w3.org">
            <e9 xmlns="" xmlns:a="http://www.ietf.org"/>
         </e8>
      </e7>
   </e6>
</doc>"#;
    let expected = r#"<doc>
   <e1></e1>
   <e2></e2>
   <e3 id="elem3" name="elem3"></e3>
   <e4 id="elem4" name="elem4"></e4>
   <e5 xmlns="http://example.org" xmlns:a="http://www.w3.org" xmlns:b="http://www.ietf.org" attr="I'm" attr2="all" b:attr="sorted" a:attr="out"></e5>
   <e6 xmlns:a="http://www.w3.org">
      <e7 xmlns="http://www.ietf.org">
         <e8 xmlns="">
            <e9 xmlns:a="http://www.ietf.org" attr="default"></e9>
         </e8>
      </e7>
   </e6>
</doc>"#;
    assert_eq!(c14n(input, Algorithm::Canonical), expected);
}

#[test]
fn test_character_modifications_and_references() {
    let input = r#"<!DOCTYPE doc [
<!ATTLIST normId id ID #IMPLIED>
<!ATTLIST normNames attr NMTOKENS #IMPLIED>
]>
<doc>
   <text>First line&#x0d;&#10;Second line</text>
   <value>&#x32;</value>
   <compute><![CDATA[value>"0" && value<"10" ?"valid":"error"]]></compute>
   <compute expr='value>"0" &amp;&amp; value&lt;"10" ?"valid":"error"'>valid</compute>
   <norm attr=' &apos;   &#x20;&#13;&#xa;&#9;   &apos; '/>
   <normNames attr='   A   &#x20;&#13;&#xa;&#9;   B   '/>
   <normId id=' &apos;   &#x20;&#13;&#xa;&#9;   &apos; '/>
</doc>"#;
    let expected = r#"<doc>
   <text>First line&#xD;
Second line</text>
   <value>2</value>
   <compute>value&gt;"0" &amp;&amp; value&lt;"10" ?"valid":"error"</compute>
   <compute expr="value>&quot;0&quot; &amp;&amp; value&lt;&quot;10&quot; ?&quot;valid&quot;:&quot;error&quot;">valid</compute>
   <norm attr=" '    &#xD;&#xA;&#x9;   ' "></norm>
   <normNames attr="A &#xD;&#xA;&#x9; B"></normNames>
   <normId id="' &#xD;&#xA;&#x9; '"></normId>
</doc>"#;
    assert_eq!(c14n(input, Algorithm::Canonical), expected);
}

#[test]
fn test_entity_references_are_expanded() {
    let input = r#"<!DOCTYPE doc [<!ENTITY ent1 "Hello"><!ENTITY ent2 "world">]>
<doc attrExtEnt="&ent1;">&ent1;, &ent2;!</doc>"#;
    assert_eq!(
        c14n(input, Algorithm::Canonical),
        r#"<doc attrExtEnt="Hello">Hello, world!</doc>"#
    );
}

#[test]
fn test_utf8_output() {
    let doc = Document::parse_bytes(b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><doc>\xa9</doc>").unwrap();
    let out = canonicalize(&doc, &C14nOptions::default());
    assert_eq!(out, "<doc>\u{a9}</doc>");
    assert_eq!(out.as_bytes(), b"<doc>\xc2\xa9</doc>");
}

// ---------------------------------------------------------------------------
// Exclusive canonicalization
// ---------------------------------------------------------------------------

const EXCLUSIVE_SOURCE: &str = r#"<n0:local xmlns:n0="foo:bar" xmlns:n3="ftp://example.org"><n1:elem2 xmlns:n1="http://example.net" xml:lang="en"><n3:stuff xmlns:n3="ftp://example.org"/></n1:elem2></n0:local>"#;

#[test]
fn test_inclusive_subtree_pulls_in_ancestor_namespaces() {
    let doc = Document::parse_str(EXCLUSIVE_SOURCE).unwrap();
    let elem2 = find(&doc, "elem2");
    let out = canonicalize_node(&doc, elem2, &C14nOptions::default().algorithm(Algorithm::Canonical)).unwrap();
    assert_eq!(
        out,
        r#"<n1:elem2 xmlns:n0="foo:bar" xmlns:n1="http://example.net" xmlns:n3="ftp://example.org" xml:lang="en"><n3:stuff></n3:stuff></n1:elem2>"#
    );
}

#[test]
fn test_exclusive_subtree_declares_only_visibly_used_namespaces() {
    let doc = Document::parse_str(EXCLUSIVE_SOURCE).unwrap();
    let elem2 = find(&doc, "elem2");
    let opts = C14nOptions::default().algorithm(Algorithm::ExclusiveCanonical);
    let out = canonicalize_node(&doc, elem2, &opts).unwrap();
    assert_eq!(
        out,
        r#"<n1:elem2 xmlns:n1="http://example.net" xml:lang="en"><n3:stuff xmlns:n3="ftp://example.org"></n3:stuff></n1:elem2>"#
    );
}

#[test]
fn test_exclusive_subtree_is_independent_of_context() {
    let a = Document::parse_str(r#"<a xmlns:x="urn:x" xmlns:unused="urn:u"><x:b attr="1"/></a>"#).unwrap();
    let b = Document::parse_str(r#"<other xmlns:y="urn:y"><x:b xmlns:x="urn:x" attr="1"/></other>"#).unwrap();
    let opts = C14nOptions::default().algorithm(Algorithm::ExclusiveCanonical);
    let left = canonicalize_node(&a, find(&a, "b"), &opts).unwrap();
    let right = canonicalize_node(&b, find(&b, "b"), &opts).unwrap();
    assert_eq!(left, right);
    assert_eq!(left, r#"<x:b xmlns:x="urn:x" attr="1"></x:b>"#);
}

#[test]
fn test_exclusive_inclusive_prefix_list() {
    let doc = Document::parse_str(EXCLUSIVE_SOURCE).unwrap();
    let elem2 = find(&doc, "elem2");
    let opts = C14nOptions::default()
        .algorithm(Algorithm::ExclusiveCanonical)
        .inclusive_prefixes("n0 #default");
    let out = canonicalize_node(&doc, elem2, &opts).unwrap();
    assert_eq!(
        out,
        r#"<n1:elem2 xmlns:n0="foo:bar" xmlns:n1="http://example.net" xml:lang="en"><n3:stuff xmlns:n3="ftp://example.org"></n3:stuff></n1:elem2>"#
    );
}

#[test]
fn test_exclusive_with_comments_keeps_comments() {
    let input = "<a><!-- c --><b/></a>";
    assert_eq!(c14n(input, Algorithm::ExclusiveCanonical), "<a><b></b></a>");
    assert_eq!(
        c14n(input, Algorithm::ExclusiveCanonicalWithComments),
        "<a><!-- c --><b></b></a>"
    );
}

// ---------------------------------------------------------------------------
// Document subsets
// ---------------------------------------------------------------------------

#[test]
fn test_subset_of_elements_without_text() {
    let doc = Document::parse_str("<doc><e1 a='1'>text<e2/></e1><e3/></doc>").unwrap();
    let set = NodeSet::from_nodes(&doc, [find(&doc, "e1"), find(&doc, "e2"), find(&doc, "e3")]);
    let out = canonicalize_subset(&doc, &set, &C14nOptions::default()).unwrap();
    assert_eq!(out, "<e1><e2></e2></e1><e3></e3>");
}

#[test]
fn test_subset_with_attribute_and_namespace_nodes() {
    let doc = Document::parse_str(r#"<doc xmlns:p="urn:p"><e p:a="1" b="2"/></doc>"#).unwrap();
    let e = find(&doc, "e");
    let mut set = NodeSet::from_nodes(&doc, [e]);
    for &attr in doc.attributes(e) {
        if doc.local_name(attr) == Some("a") {
            set.insert(NodeRef::Node(attr));
        }
    }
    set.insert(NodeRef::Namespace {
        element: e,
        prefix: "p".to_string(),
    });
    let opts = C14nOptions::default().algorithm(Algorithm::Canonical);
    let out = canonicalize_subset(&doc, &set, &opts).unwrap();
    assert_eq!(out, r#"<e xmlns:p="urn:p" p:a="1"></e>"#);
}

#[test]
fn test_subset_with_document_node_keeps_prolog_layout() {
    let doc = Document::parse_str("<?pi?><doc><e/></doc><!--tail-->").unwrap();
    let e = find(&doc, "e");
    let mut set = NodeSet::new(&doc);
    for node in NodeSet::subtree(&doc, doc.root()).iter() {
        if *node != NodeRef::Node(e) {
            set.insert(node.clone());
        }
    }
    let out = canonicalize_subset(&doc, &set, &C14nOptions::default()).unwrap();
    assert_eq!(out, "<?pi?>\n<doc></doc>\n<!--tail-->");
}

#[test]
fn test_whole_subtree_subset_matches_document() {
    let input = r#"<doc xmlns="urn:d" b="2" a="1"><x:e xmlns:x="urn:x"><!--c-->t</x:e></doc>"#;
    let doc = Document::parse_str(input).unwrap();
    let set = NodeSet::subtree(&doc, doc.root());
    for algorithm in Algorithm::ALL {
        let opts = C14nOptions::default().algorithm(algorithm);
        assert_eq!(
            canonicalize_subset(&doc, &set, &opts).unwrap(),
            canonicalize(&doc, &opts),
            "{algorithm}"
        );
    }
}

#[test]
fn test_canonicalizer_writes_to_buffer() {
    let doc = Document::parse_str("<a><!--c--><b/></a>").unwrap();
    let mut canonicalizer = Canonicalizer::new(Vec::new(), Algorithm::Canonical);
    canonicalizer.write_document(&doc).unwrap();
    canonicalizer.write_node(&doc, find(&doc, "b")).unwrap();
    assert_eq!(canonicalizer.into_inner(), b"<a><b></b></a><b></b>");
}

#[test]
fn test_canonical_form_is_idempotent() {
    let input = r#"<doc   b="2" a='1' xmlns:z="urn:z"><z:x z:q="&lt;&amp;"/>  <![CDATA[<>]]></doc>"#;
    let once = c14n(input, Algorithm::Canonical);
    let twice = c14n(&once, Algorithm::Canonical);
    assert_eq!(once, twice);
}
